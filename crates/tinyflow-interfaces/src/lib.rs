//! Transport abstraction for the BLETinyFlow protocol engine.
//!
//! The protocol state machines produce actions rather than performing I/O;
//! a [`FrameTransport`] implementation bridges those actions to an actual
//! link. This crate defines the trait, an in-memory loopback pair used by
//! tests and demos, and conformance helpers for transport implementations.

pub mod error;
pub mod memory;
pub mod testing;
pub mod traits;

pub use error::TransportError;
pub use memory::{MemoryEndpoint, MemoryLink};
pub use traits::FrameTransport;
