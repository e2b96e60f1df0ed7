//! The transport trait consumed by the protocol engine.

use crate::error::TransportError;

/// Writes to a BLE-style two-characteristic link.
///
/// The engine depends only on this trait, never on a concrete transport;
/// the transport owns the engine and feeds events into it, which breaks the
/// reference cycle between the two.
///
/// All writes are non-suspending at the engine level. `send_control` is a
/// write-with-response whose completion is the implementation's concern;
/// `send_data` is a write-without-response with flow control delegated to
/// the link. Implementations must preserve FIFO order per characteristic.
pub trait FrameTransport: Send {
    /// Human-readable name for logging (e.g. "MemoryLink[central]").
    fn name(&self) -> &str;

    /// Negotiated MTU, bounding a single write including the ATT header.
    fn mtu(&self) -> u16;

    fn is_connected(&self) -> bool;

    /// Write-with-response on the control characteristic (central side).
    fn send_control(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Notification on the control characteristic (peripheral side).
    fn notify_control(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Write-without-response on the data characteristic.
    fn send_data(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Tear the link down. Idempotent.
    fn disconnect(&mut self) -> Result<(), TransportError>;
}
