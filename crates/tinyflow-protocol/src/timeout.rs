//! Inactivity timeout decision.

use std::time::Duration;

/// Whether a peer has gone silent for longer than the configured timeout.
pub fn timed_out(elapsed: Duration, timeout: Duration) -> bool {
    elapsed > timeout
}
