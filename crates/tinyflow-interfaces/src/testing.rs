//! Generic conformance assertions for [`FrameTransport`] implementations.
//!
//! These helpers validate invariants that every transport should satisfy,
//! regardless of the underlying link.
//!
//! # Usage
//!
//! ```rust
//! use tinyflow_interfaces::{testing, MemoryLink};
//!
//! let mut link = MemoryLink::new(512);
//! testing::assert_has_name(&link.central);
//! testing::assert_enforces_frame_limits(&mut link.central);
//! testing::assert_disconnect_conformance(&mut link.central);
//! ```

use tinyflow_core::constants::CONTROL_MSG_SIZE;

use crate::error::TransportError;
use crate::traits::FrameTransport;

/// Assert that the transport has a non-empty name.
pub fn assert_has_name(transport: &impl FrameTransport) {
    assert!(!transport.name().is_empty(), "transport name must not be empty");
}

/// Assert that the MTU is large enough to carry a control frame.
pub fn assert_mtu_carries_control(transport: &impl FrameTransport) {
    let att_payload = usize::from(transport.mtu()).saturating_sub(3);
    assert!(
        att_payload >= CONTROL_MSG_SIZE,
        "MTU {} cannot carry a 20-byte control frame",
        transport.mtu()
    );
}

/// Assert that oversized control and data frames are rejected with
/// `FrameTooLarge`.
pub fn assert_enforces_frame_limits(transport: &mut impl FrameTransport) {
    let result = transport.send_control(&[0u8; CONTROL_MSG_SIZE + 1]);
    assert!(
        matches!(result, Err(TransportError::FrameTooLarge { .. })),
        "oversized control frame should be rejected, got {result:?}"
    );

    let oversize = usize::from(transport.mtu()) + 1;
    let result = transport.send_data(&vec![0u8; oversize]);
    assert!(
        matches!(result, Err(TransportError::FrameTooLarge { .. })),
        "oversized data frame should be rejected, got {result:?}"
    );
}

/// Assert that `disconnect` succeeds, drops the connection, and is
/// idempotent, and that writes fail afterwards.
pub fn assert_disconnect_conformance(transport: &mut impl FrameTransport) {
    transport.disconnect().expect("first disconnect should succeed");
    assert!(!transport.is_connected(), "still connected after disconnect");

    transport.disconnect().expect("second disconnect should be a no-op");

    let result = transport.send_data(&[0u8; 4]);
    assert!(
        result.is_err(),
        "data write after disconnect should fail, got {result:?}"
    );
}
