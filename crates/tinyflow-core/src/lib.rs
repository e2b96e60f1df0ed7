//! Wire codec and protocol constants for BLETinyFlow.
//!
//! BLETinyFlow is a unidirectional, receiver-driven file-transfer protocol
//! over a BLE-style transport: a 20-byte bidirectional control channel and a
//! higher-throughput unidirectional data channel. This crate defines the
//! bit-exact wire formats and nothing else: no state, no I/O.

pub mod constants;
pub mod control;
pub mod data;
pub mod error;

pub use constants::{Command, ErrorCode};
pub use control::{ControlMessage, DeviceInfo};
pub use data::DataChunk;
pub use error::WireError;
