//! Protocol constants and wire enumerations for BLETinyFlow.

use crate::error::WireError;

// Wire format sizes
pub const CONTROL_MSG_SIZE: usize = 20;
pub const CONTROL_MSG_MIN_SIZE: usize = 15;
pub const DATA_HEADER_SIZE: usize = 4;
pub const ATT_HEADER_SIZE: usize = 3;

// MTU bounds
pub const MAX_MTU: u16 = 512;
pub const DEFAULT_MTU: u16 = 23;

/// Upper bound on a single transfer, enforced by both peers.
pub const MAX_TRANSFER_SIZE: u32 = 1024 * 1024;

/// Chunks requested per CHUNK_REQUEST batch.
pub const DEFAULT_CHUNKS_PER_REQUEST: u16 = 40;
/// Batch size used by older senders; still accepted via configuration.
pub const LEGACY_CHUNKS_PER_REQUEST: u16 = 20;

/// Coarse per-peer inactivity timeout in seconds.
pub const TRANSFER_TIMEOUT_SECS: u64 = 30;

// GATT identifiers (informational for transport implementations)
pub const SERVICE_UUID: &str = "6E400001-B5A3-F393-E0A9-E50E24DCCA9E";
pub const CONTROL_CHAR_UUID: &str = "6E400002-B5A3-F393-E0A9-E50E24DCCA9E";
pub const DATA_CHANNEL_0_CHAR_UUID: &str = "6E400010-B5A3-F393-E0A9-E50E24DCCA9E";

/// Control message opcodes (protocol v1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Sender → receiver: announce a transfer (total size, chunk size, chunk count).
    TransferInit = 0x01,
    /// Receiver → sender: advisory device description, sent on connect.
    DeviceInfo = 0x02,
    /// Receiver → sender: request a contiguous range of chunks.
    ChunkRequest = 0x82,
    /// Receiver → sender: all chunks received.
    TransferCompleteAck = 0x83,
    /// Receiver → sender: terminal protocol violation.
    TransferError = 0x84,
}

impl Command {
    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            0x01 => Ok(Command::TransferInit),
            0x02 => Ok(Command::DeviceInfo),
            0x82 => Ok(Command::ChunkRequest),
            0x83 => Ok(Command::TransferCompleteAck),
            0x84 => Ok(Command::TransferError),
            _ => Err(WireError::UnknownCommand(v)),
        }
    }
}

/// Error codes carried in `param1` of a TRANSFER_ERROR message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    UnknownError = 0x01,
    TransferTooLarge = 0x02,
    ChunkSizeTooLarge = 0x03,
    MemoryAllocationFailed = 0x04,
    BufferOverflow = 0x05,
    InvalidChunkId = 0x06,
    DuplicateChunk = 0x07,
    ControlMessageTooShort = 0x08,
    DataChunkTooShort = 0x09,
    NotificationSendFailed = 0x0A,
    InvalidCommand = 0x0B,
}

impl ErrorCode {
    pub fn from_u32(v: u32) -> Result<Self, WireError> {
        match v {
            0x01 => Ok(ErrorCode::UnknownError),
            0x02 => Ok(ErrorCode::TransferTooLarge),
            0x03 => Ok(ErrorCode::ChunkSizeTooLarge),
            0x04 => Ok(ErrorCode::MemoryAllocationFailed),
            0x05 => Ok(ErrorCode::BufferOverflow),
            0x06 => Ok(ErrorCode::InvalidChunkId),
            0x07 => Ok(ErrorCode::DuplicateChunk),
            0x08 => Ok(ErrorCode::ControlMessageTooShort),
            0x09 => Ok(ErrorCode::DataChunkTooShort),
            0x0A => Ok(ErrorCode::NotificationSendFailed),
            0x0B => Ok(ErrorCode::InvalidCommand),
            _ => Err(WireError::UnknownErrorCode(v)),
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::TransferTooLarge => "TRANSFER_TOO_LARGE",
            ErrorCode::ChunkSizeTooLarge => "CHUNK_SIZE_TOO_LARGE",
            ErrorCode::MemoryAllocationFailed => "MEMORY_ALLOCATION_FAILED",
            ErrorCode::BufferOverflow => "BUFFER_OVERFLOW",
            ErrorCode::InvalidChunkId => "INVALID_CHUNK_ID",
            ErrorCode::DuplicateChunk => "DUPLICATE_CHUNK",
            ErrorCode::ControlMessageTooShort => "CONTROL_MESSAGE_TOO_SHORT",
            ErrorCode::DataChunkTooShort => "DATA_CHUNK_TOO_SHORT",
            ErrorCode::NotificationSendFailed => "NOTIFICATION_SEND_FAILED",
            ErrorCode::InvalidCommand => "INVALID_COMMAND",
        };
        write!(f, "{name} (0x{:02X})", self.as_u32())
    }
}
