//! Protocol state machines for BLETinyFlow.
//!
//! This crate implements both peers of the transfer protocol: the sender
//! (central) that announces a transfer and streams requested chunk ranges,
//! and the receiver (peripheral) that drives the transfer by requesting
//! batches and reassembling the payload.
//!
//! The state machines are deliberately decoupled from I/O: every inbound
//! event returns a list of actions (frames to write, events for the
//! application) that the host executes. Serialized delivery of events is
//! the host's responsibility; [`mux::EventMux`] documents and enforces the
//! single-owner contract.

pub mod constants;
pub mod error;
pub mod mux;
pub mod packetize;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod timeout;

pub use error::{ReceiverError, SenderError};
pub use mux::{EventMux, SessionHandler, TransportEvent};
pub use packetize::{chunk_count, max_payload, ChunkPlan};
pub use receiver::{
    CompletedTransfer, ReceivedBuffer, Receiver, ReceiverAction, ReceiverConfig, ReceiverStatus,
};
pub use sender::{Sender, SenderAction, SenderConfig, SenderStatus};
pub use stats::TransferStats;
