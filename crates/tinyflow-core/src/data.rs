//! Data packet codec.
//!
//! Data frames carry one chunk per transport write:
//! `chunk_id(2 LE) || payload_length(2 LE) || payload(N)`.
//!
//! On decode, a declared length that disagrees with the trailing slice is
//! not an error: both values are exposed and the receiver prefers the
//! observed slice length, logging the mismatch.

use crate::constants::DATA_HEADER_SIZE;
use crate::error::WireError;

/// A borrowed view of a decoded data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChunk<'a> {
    pub chunk_id: u16,
    /// Payload length as declared in the header.
    pub declared_len: u16,
    /// The payload bytes actually present after the header.
    pub payload: &'a [u8],
}

impl<'a> DataChunk<'a> {
    /// Encode a chunk into its wire form: `4 + payload.len()` bytes.
    pub fn encode(chunk_id: u16, payload: &[u8]) -> Result<Vec<u8>, WireError> {
        if payload.len() > usize::from(u16::MAX) {
            return Err(WireError::PayloadTooLarge { len: payload.len() });
        }

        let mut buf = Vec::with_capacity(DATA_HEADER_SIZE + payload.len());
        buf.extend_from_slice(&chunk_id.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(payload);

        tracing::trace!(chunk_id, payload_len = payload.len(), "encoded data chunk");

        Ok(buf)
    }

    /// Decode a data frame. Fails only when the 4-byte header is incomplete.
    pub fn decode(data: &'a [u8]) -> Result<Self, WireError> {
        if data.len() < DATA_HEADER_SIZE {
            return Err(WireError::DataTooShort { actual: data.len() });
        }

        let chunk_id = u16::from_le_bytes([data[0], data[1]]);
        let declared_len = u16::from_le_bytes([data[2], data[3]]);
        let payload = &data[DATA_HEADER_SIZE..];

        tracing::trace!(
            chunk_id,
            declared_len,
            actual_len = payload.len(),
            "decoded data chunk"
        );

        Ok(Self {
            chunk_id,
            declared_len,
            payload,
        })
    }

    /// Whether the declared length matches the observed payload slice.
    pub fn length_consistent(&self) -> bool {
        usize::from(self.declared_len) == self.payload.len()
    }
}
