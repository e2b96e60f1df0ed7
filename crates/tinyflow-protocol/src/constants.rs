//! Protocol-layer tuning constants.

use std::time::Duration;

/// Coarse inactivity timeout applied by both peers.
pub const TRANSFER_TIMEOUT: Duration =
    Duration::from_secs(tinyflow_core::constants::TRANSFER_TIMEOUT_SECS);

/// Sender progress events are coalesced to at most one per this many chunks.
pub const PROGRESS_STRIDE: u32 = 5;
