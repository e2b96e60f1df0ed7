//! Control message codec.
//!
//! Control frames are fixed 20 bytes on the wire:
//! `command(1) || sequence(2) || param1(4) || param2(4) || param3(4) || reserved(5)`,
//! all integers little-endian. Reserved bytes are zeroed on send and ignored
//! on receive. Frames of 15–20 bytes parse, with unsent trailing bytes
//! treated as zero; anything shorter is rejected.

use crate::constants::{Command, CONTROL_MSG_MIN_SIZE, CONTROL_MSG_SIZE, ErrorCode};
use crate::error::WireError;

/// A decoded control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub command: Command,
    pub sequence: u16,
    pub param1: u32,
    pub param2: u32,
    pub param3: u32,
}

impl ControlMessage {
    /// Encode to the fixed 20-byte wire form, reserved bytes zeroed.
    pub fn encode(&self) -> [u8; CONTROL_MSG_SIZE] {
        let mut buf = [0u8; CONTROL_MSG_SIZE];
        buf[0] = self.command as u8;
        buf[1..3].copy_from_slice(&self.sequence.to_le_bytes());
        buf[3..7].copy_from_slice(&self.param1.to_le_bytes());
        buf[7..11].copy_from_slice(&self.param2.to_le_bytes());
        buf[11..15].copy_from_slice(&self.param3.to_le_bytes());

        tracing::trace!(
            command = ?self.command,
            sequence = self.sequence,
            "encoded control message"
        );

        buf
    }

    /// Decode a control frame.
    ///
    /// Fails when fewer than 15 bytes are present or the opcode is unknown.
    /// Bytes beyond the 20-byte frame are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < CONTROL_MSG_MIN_SIZE {
            return Err(WireError::ControlTooShort { actual: data.len() });
        }

        let command = Command::from_u8(data[0])?;
        let sequence = u16::from_le_bytes([data[1], data[2]]);
        let param1 = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
        let param2 = u32::from_le_bytes([data[7], data[8], data[9], data[10]]);
        let param3 = u32::from_le_bytes([data[11], data[12], data[13], data[14]]);

        tracing::trace!(?command, sequence, "decoded control message");

        Ok(Self {
            command,
            sequence,
            param1,
            param2,
            param3,
        })
    }

    /// Build a TRANSFER_INIT announcing `total_size` bytes in `expected_chunks`
    /// chunks of `chunk_size`.
    pub fn transfer_init(sequence: u16, total_size: u32, chunk_size: u32, expected_chunks: u32) -> Self {
        Self {
            command: Command::TransferInit,
            sequence,
            param1: total_size,
            param2: chunk_size,
            param3: expected_chunks,
        }
    }

    /// Build a CHUNK_REQUEST for `count` chunks starting at `start`.
    pub fn chunk_request(sequence: u16, start: u32, count: u32) -> Self {
        Self {
            command: Command::ChunkRequest,
            sequence,
            param1: start,
            param2: count,
            param3: 0,
        }
    }

    /// Build a TRANSFER_COMPLETE_ACK reporting `received_size` bytes.
    pub fn transfer_complete_ack(sequence: u16, received_size: u32) -> Self {
        Self {
            command: Command::TransferCompleteAck,
            sequence,
            param1: received_size,
            param2: 0,
            param3: 0,
        }
    }

    /// Build a TRANSFER_ERROR carrying `code` and additional `context`.
    pub fn transfer_error(sequence: u16, code: ErrorCode, context: u32) -> Self {
        Self {
            command: Command::TransferError,
            sequence,
            param1: code.as_u32(),
            param2: context,
            param3: 0,
        }
    }

    /// Build a DEVICE_INFO advisory message.
    pub fn device_info(sequence: u16, info: &DeviceInfo) -> Self {
        let (param1, param2) = info.to_params();
        Self {
            command: Command::DeviceInfo,
            sequence,
            param1,
            param2,
            param3: 0,
        }
    }
}

/// Advisory device description carried by DEVICE_INFO.
///
/// `param1` packs the device type in the low byte and the battery percentage
/// in the next byte; `param2` packs display width (low 16 bits) and height
/// (high 16 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: u8,
    pub battery_percent: u8,
    pub width: u16,
    pub height: u16,
}

impl DeviceInfo {
    pub fn to_params(&self) -> (u32, u32) {
        let param1 = u32::from(self.device_type) | (u32::from(self.battery_percent) << 8);
        let param2 = u32::from(self.width) | (u32::from(self.height) << 16);
        (param1, param2)
    }

    pub fn from_params(param1: u32, param2: u32) -> Self {
        Self {
            device_type: (param1 & 0xFF) as u8,
            battery_percent: ((param1 >> 8) & 0xFF) as u8,
            width: (param2 & 0xFFFF) as u16,
            height: ((param2 >> 16) & 0xFFFF) as u16,
        }
    }
}
