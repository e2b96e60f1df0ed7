//! Runtime binding for the BLETinyFlow protocol engine.
//!
//! Each peer runs as a single tokio task that pumps transport events into
//! its state machine one at a time and executes the returned actions,
//! giving each session the serialized execution context the protocol
//! requires. Configuration is TOML, logging is `tracing`.

pub mod config;
pub mod error;
pub mod logging;
pub mod service;

pub use config::NodeConfig;
pub use error::NodeError;
pub use service::{ReceiverService, SenderService};
