//! Transfer statistics.

use std::time::Duration;

/// Snapshot of a completed or in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransferStats {
    /// Payload bytes moved (header overhead excluded).
    pub bytes: u32,
    /// Chunks written to (sender) or accepted from (receiver) the wire.
    pub chunks: u32,
    /// Wall time from INIT to the snapshot.
    pub elapsed: Duration,
}

impl TransferStats {
    /// Throughput in payload bytes per second; zero when no time has elapsed.
    pub fn throughput_bps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            f64::from(self.bytes) / secs
        } else {
            0.0
        }
    }
}
