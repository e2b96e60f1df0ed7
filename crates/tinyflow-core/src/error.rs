//! Wire-level decode errors.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("control message too short: {actual} bytes (minimum 15)")]
    ControlTooShort { actual: usize },

    #[error("unknown control command: 0x{0:02X}")]
    UnknownCommand(u8),

    #[error("data packet too short: {actual} bytes (minimum 4)")]
    DataTooShort { actual: usize },

    #[error("data payload too large: {len} bytes (length field is 16-bit)")]
    PayloadTooLarge { len: usize },

    #[error("unknown transfer error code: 0x{0:08X}")]
    UnknownErrorCode(u32),
}
