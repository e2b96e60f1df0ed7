//! Protocol error types.
//!
//! [`ReceiverError`] covers session failures visible to the receiving
//! application; the wire-visible taxonomy it maps onto lives in
//! `tinyflow_core::constants::ErrorCode`. [`SenderError`] covers
//! sender-local failures, which are never written to the wire.

use tinyflow_core::constants::ErrorCode;
use tinyflow_core::error::WireError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiverError {
    #[error("transfer failed: {code}")]
    Protocol { code: ErrorCode, context: u32 },

    #[error("transfer timed out waiting for data")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SenderError {
    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error("transport not connected")]
    NotConnected,

    #[error("negotiated MTU {mtu} leaves no room for a data payload")]
    MtuTooSmall { mtu: u16 },

    #[error("transfer timed out waiting for the receiver")]
    Timeout,

    #[error("receiver reported {0}")]
    Peer(ErrorCode),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}
