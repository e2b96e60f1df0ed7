//! Node-level error type.

use tinyflow_interfaces::TransportError;
use tinyflow_protocol::error::{ReceiverError, SenderError};

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("sender failed: {0}")]
    Sender(#[from] SenderError),

    #[error("receiver failed: {0}")]
    Receiver(#[from] ReceiverError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("link closed before the transfer completed")]
    LinkClosed,
}
