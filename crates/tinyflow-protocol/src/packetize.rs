//! MTU-derived packetization policy.
//!
//! Given a negotiated MTU, derives the maximum data payload per transport
//! write and partitions a payload into a deterministic ordered sequence of
//! fixed-size chunks (the last chunk may be short).

use std::ops::Range;

use tinyflow_core::constants::{ATT_HEADER_SIZE, DATA_HEADER_SIZE, MAX_MTU};

/// Maximum data payload per transport write for a negotiated MTU.
///
/// `clamp(mtu, MAX_MTU) - ATT_HEADER(3) - DATA_HEADER(4)`, saturating: MTUs
/// at or below the combined header overhead yield 0. With MTU 512 this is 505.
pub fn max_payload(mtu: u16) -> usize {
    let mtu = usize::from(mtu.min(MAX_MTU));
    mtu.saturating_sub(ATT_HEADER_SIZE + DATA_HEADER_SIZE)
}

/// Number of chunks needed for `total` bytes at `chunk_size` bytes per chunk.
///
/// `ceil(total / chunk_size)`; zero for an empty payload. `chunk_size` must
/// be non-zero when `total` is non-zero.
pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    if total == 0 {
        return 0;
    }
    debug_assert!(chunk_size > 0);
    total.div_ceil(chunk_size)
}

/// A deterministic partition of `[0, total_size)` into ordered chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: usize,
    chunk_size: usize,
    expected_chunks: usize,
}

impl ChunkPlan {
    /// Build a plan. Returns `None` for the degenerate case of a non-empty
    /// payload with a zero chunk size.
    pub fn new(total_size: usize, chunk_size: usize) -> Option<Self> {
        if total_size > 0 && chunk_size == 0 {
            return None;
        }
        Some(Self {
            total_size,
            chunk_size,
            expected_chunks: chunk_count(total_size, chunk_size),
        })
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn expected_chunks(&self) -> usize {
        self.expected_chunks
    }

    /// Byte range of chunk `id`, or `None` when `id` is out of range.
    ///
    /// Chunk `id` covers `[id*chunk_size, min((id+1)*chunk_size, total_size))`.
    pub fn bounds(&self, id: usize) -> Option<Range<usize>> {
        if id >= self.expected_chunks {
            return None;
        }
        let start = id * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_size);
        Some(start..end)
    }

    /// Length in bytes of chunk `id`.
    pub fn len_of(&self, id: usize) -> Option<usize> {
        self.bounds(id).map(|r| r.len())
    }

    /// Iterate all chunk ranges in order.
    pub fn iter(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.expected_chunks).map(move |id| {
            let start = id * self.chunk_size;
            start..(start + self.chunk_size).min(self.total_size)
        })
    }
}
