//! Receiver-side transfer state machine.
//!
//! The receiver (BLE peripheral) drives the transfer: on a valid
//! TRANSFER_INIT it allocates the receive buffer and chunk-receipt map,
//! requests chunk batches, reassembles the payload at MTU-derived offsets,
//! acknowledges completion, and hands the buffer to the application.
//!
//! States: `Idle → InitReceived → Requesting → Receiving → Complete`, with
//! `Error` reachable from any state. `Complete` and `Error` are terminal for
//! the session; recovery is by disconnect and reconnection.
//!
//! The machine performs no I/O. Every inbound event returns a list of
//! [`ReceiverAction`]s for the host to execute, in order.

use std::time::{Duration, Instant};

use tinyflow_core::constants::{
    Command, ErrorCode, DEFAULT_CHUNKS_PER_REQUEST, DEFAULT_MTU, MAX_TRANSFER_SIZE,
};
use tinyflow_core::control::{ControlMessage, DeviceInfo};
use tinyflow_core::data::DataChunk;
use tinyflow_core::error::WireError;

use crate::constants::TRANSFER_TIMEOUT;
use crate::error::ReceiverError;
use crate::packetize::{self, ChunkPlan};
use crate::timeout::timed_out;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Receiver tuning knobs.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Upper bound accepted in TRANSFER_INIT.
    pub max_transfer_size: u32,
    /// Chunks requested per CHUNK_REQUEST batch.
    pub chunks_per_request: u16,
    /// Inactivity timeout, reset by every inbound data frame.
    pub timeout: Duration,
    /// Advisory DEVICE_INFO sent on connect when present.
    pub device_info: Option<DeviceInfo>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_transfer_size: MAX_TRANSFER_SIZE,
            chunks_per_request: DEFAULT_CHUNKS_PER_REQUEST,
            timeout: TRANSFER_TIMEOUT,
            device_info: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actions and the delivered buffer
// ---------------------------------------------------------------------------

/// Host-executed outcome of a receiver event.
#[derive(Debug)]
pub enum ReceiverAction {
    /// Notify the encoded control frame to the central.
    NotifyControl(Vec<u8>),
    /// Hand the completed transfer to the application.
    Deliver(CompletedTransfer),
    /// Report a terminal session failure to the application.
    Failed(ReceiverError),
    /// Tear the connection down.
    Disconnect,
}

/// A finished transfer handed to the application.
#[derive(Debug)]
pub struct CompletedTransfer {
    pub buffer: ReceivedBuffer,
    /// Total payload bytes received.
    pub size: u32,
    /// Advisory: the first two bytes match the JPEG SOI marker.
    pub jpeg_magic: bool,
}

/// The reassembled payload, owned by the application after delivery.
///
/// The application releases it exactly once when done reading; a second
/// release is a no-op with a warning. Dropping an unreleased buffer frees
/// it implicitly.
#[derive(Debug)]
pub struct ReceivedBuffer {
    data: Option<Vec<u8>>,
}

impl ReceivedBuffer {
    fn new(data: Vec<u8>) -> Self {
        Self { data: Some(data) }
    }

    /// The payload bytes; empty after release.
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.data.is_none()
    }

    /// Free the payload. Idempotent.
    pub fn release(&mut self) {
        match self.data.take() {
            Some(data) => {
                tracing::debug!(bytes = data.len(), "released receive buffer");
            }
            None => {
                tracing::warn!("receive buffer already released");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverStatus {
    Idle,
    InitReceived,
    Requesting,
    Receiving,
    Complete,
    Error,
}

/// State of the in-flight transfer.
struct ActiveTransfer {
    plan: ChunkPlan,
    total_size: u32,
    buffer: Vec<u8>,
    received_map: Vec<bool>,
    /// Invariant: equals the number of set flags in `received_map`.
    received_count: usize,
    received_bytes: u32,
    batch_start: usize,
    /// Inclusive end of the current batch window.
    batch_end: usize,
    batch_received: usize,
}

impl ActiveTransfer {
    /// Chunks expected in the current batch window, clamped to the plan.
    fn expected_batch_size(&self) -> usize {
        let last = self.batch_end.min(self.plan.expected_chunks().saturating_sub(1));
        last + 1 - self.batch_start
    }
}

/// The receiver-side protocol state machine.
pub struct Receiver {
    config: ReceiverConfig,
    mtu: u16,
    sequence: u16,
    status: ReceiverStatus,
    transfer: Option<ActiveTransfer>,
    /// Reset by every inbound data frame while a session is active.
    last_data: Option<Instant>,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        let mut config = config;
        if config.chunks_per_request == 0 {
            tracing::warn!("chunks_per_request of 0 is invalid, using default");
            config.chunks_per_request = DEFAULT_CHUNKS_PER_REQUEST;
        }
        Self {
            config,
            mtu: DEFAULT_MTU,
            sequence: 0,
            status: ReceiverStatus::Idle,
            transfer: None,
            last_data: None,
        }
    }

    pub fn status(&self) -> ReceiverStatus {
        self.status
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Payload bytes received so far in the active session.
    pub fn received_bytes(&self) -> u32 {
        self.transfer.as_ref().map_or(0, |t| t.received_bytes)
    }

    pub fn total_size(&self) -> u32 {
        self.transfer.as_ref().map_or(0, |t| t.total_size)
    }

    pub fn expected_chunks(&self) -> u32 {
        self.transfer
            .as_ref()
            .map_or(0, |t| t.plan.expected_chunks() as u32)
    }

    // ------------------------------------------------------------------ //
    // Transport events
    // ------------------------------------------------------------------ //

    /// Connection established. Emits the advisory DEVICE_INFO when configured.
    pub fn on_connected(&mut self) -> Vec<ReceiverAction> {
        tracing::info!("receiver connected");
        match self.config.device_info {
            Some(info) => {
                let seq = self.next_sequence();
                let frame = ControlMessage::device_info(seq, &info).encode();
                vec![ReceiverAction::NotifyControl(frame.to_vec())]
            }
            None => Vec::new(),
        }
    }

    pub fn on_mtu_changed(&mut self, mtu: u16) {
        tracing::debug!(mtu, "MTU updated");
        self.mtu = mtu;
    }

    /// Connection lost: tear the session down and reset the MTU for the
    /// next connection.
    pub fn on_disconnected(&mut self) {
        tracing::info!("receiver disconnected, resetting session");
        self.reset_session();
        self.mtu = DEFAULT_MTU;
    }

    /// An inbound control frame from the central.
    pub fn on_control_frame(&mut self, frame: &[u8]) -> Vec<ReceiverAction> {
        if self.status == ReceiverStatus::Error {
            tracing::trace!("ignoring control frame in error state");
            return Vec::new();
        }

        let msg = match ControlMessage::decode(frame) {
            Ok(msg) => msg,
            Err(WireError::ControlTooShort { actual }) => {
                tracing::error!(len = actual, "control message too short");
                return self.fail(ErrorCode::ControlMessageTooShort, actual as u32);
            }
            Err(WireError::UnknownCommand(cmd)) => {
                tracing::warn!(command = cmd, "unknown control command");
                return self.fail(ErrorCode::InvalidCommand, u32::from(cmd));
            }
            Err(e) => {
                tracing::error!(error = %e, "control decode failed");
                return self.fail(ErrorCode::UnknownError, 0);
            }
        };

        tracing::debug!(
            command = ?msg.command,
            sequence = msg.sequence,
            p1 = msg.param1,
            p2 = msg.param2,
            p3 = msg.param3,
            "control message"
        );

        match msg.command {
            Command::TransferInit => self.handle_transfer_init(&msg),
            other => {
                // Only TRANSFER_INIT flows central → peripheral on the
                // control channel in v1.
                tracing::warn!(command = ?other, "unexpected control command for receiver");
                self.fail(ErrorCode::InvalidCommand, u32::from(other as u8))
            }
        }
    }

    /// An inbound data frame from the central.
    pub fn on_data_frame(&mut self, frame: &[u8]) -> Vec<ReceiverAction> {
        if self.status == ReceiverStatus::Error {
            tracing::trace!("ignoring data frame in error state");
            return Vec::new();
        }
        if !matches!(
            self.status,
            ReceiverStatus::Requesting | ReceiverStatus::Receiving
        ) {
            tracing::warn!(status = ?self.status, "data frame received in wrong state");
            return Vec::new();
        }

        let chunk = match DataChunk::decode(frame) {
            Ok(chunk) => chunk,
            Err(WireError::DataTooShort { actual }) => {
                tracing::error!(len = actual, "data chunk too short");
                return self.fail(ErrorCode::DataChunkTooShort, actual as u32);
            }
            Err(e) => {
                tracing::error!(error = %e, "data decode failed");
                return self.fail(ErrorCode::UnknownError, 0);
            }
        };

        if !chunk.length_consistent() {
            // Prefer the observed slice over the declared header length.
            tracing::debug!(
                chunk_id = chunk.chunk_id,
                declared = chunk.declared_len,
                actual = chunk.payload.len(),
                "data length mismatch, using observed payload"
            );
        }

        self.store_chunk(usize::from(chunk.chunk_id), chunk.payload)
    }

    /// The transport refused to deliver a queued notification.
    pub fn on_notify_rejected(&mut self) -> Vec<ReceiverAction> {
        if self.status == ReceiverStatus::Error {
            return Vec::new();
        }
        tracing::error!("control notification rejected by transport");
        self.fail(ErrorCode::NotificationSendFailed, 0)
    }

    /// Periodic poll for the coarse inactivity timeout.
    pub fn on_tick(&mut self) -> Vec<ReceiverAction> {
        self.on_tick_at(Instant::now())
    }

    fn on_tick_at(&mut self, now: Instant) -> Vec<ReceiverAction> {
        let expired = match self.last_data {
            Some(last) if self.transfer.is_some() => {
                timed_out(now.saturating_duration_since(last), self.config.timeout)
            }
            _ => false,
        };
        if !expired {
            return Vec::new();
        }

        // The peer has gone silent: there is no wire code for this, so the
        // teardown is local only.
        tracing::error!(timeout = ?self.config.timeout, "transfer timed out");
        self.reset_session();
        self.status = ReceiverStatus::Error;
        vec![ReceiverAction::Failed(ReceiverError::Timeout)]
    }

    // ------------------------------------------------------------------ //
    // Protocol handlers
    // ------------------------------------------------------------------ //

    fn handle_transfer_init(&mut self, msg: &ControlMessage) -> Vec<ReceiverAction> {
        let total_size = msg.param1;
        let chunk_size = msg.param2;
        let expected_chunks = msg.param3;

        tracing::info!(total_size, chunk_size, expected_chunks, "TRANSFER_INIT");

        if self.transfer.is_some() || self.status != ReceiverStatus::Idle {
            tracing::warn!("TRANSFER_INIT during active session, resetting");
            self.reset_session();
        }

        if total_size > self.config.max_transfer_size {
            tracing::error!(
                total_size,
                max = self.config.max_transfer_size,
                "transfer too large"
            );
            return self.fail(ErrorCode::TransferTooLarge, total_size);
        }

        let max_payload = packetize::max_payload(self.mtu) as u32;
        if chunk_size > max_payload {
            tracing::error!(chunk_size, max_payload, "chunk size too large");
            return self.fail(ErrorCode::ChunkSizeTooLarge, chunk_size);
        }

        let plan = match ChunkPlan::new(total_size as usize, chunk_size as usize) {
            Some(plan) => plan,
            None => {
                tracing::error!(chunk_size, "zero chunk size with non-empty payload");
                return self.fail(ErrorCode::InvalidCommand, chunk_size);
            }
        };
        if plan.expected_chunks() != expected_chunks as usize {
            tracing::error!(
                declared = expected_chunks,
                derived = plan.expected_chunks(),
                "inconsistent chunk count in TRANSFER_INIT"
            );
            return self.fail(ErrorCode::InvalidCommand, expected_chunks);
        }

        let mut buffer = Vec::new();
        if buffer.try_reserve_exact(total_size as usize).is_err() {
            tracing::error!(total_size, "receive buffer allocation failed");
            return self.fail(ErrorCode::MemoryAllocationFailed, total_size);
        }
        buffer.resize(total_size as usize, 0);

        let mut received_map = Vec::new();
        if received_map.try_reserve_exact(plan.expected_chunks()).is_err() {
            tracing::error!("chunk receipt map allocation failed");
            return self.fail(ErrorCode::MemoryAllocationFailed, expected_chunks);
        }
        received_map.resize(plan.expected_chunks(), false);

        let chunks = plan.expected_chunks();
        self.transfer = Some(ActiveTransfer {
            plan,
            total_size,
            buffer,
            received_map,
            received_count: 0,
            received_bytes: 0,
            batch_start: 0,
            batch_end: 0,
            batch_received: 0,
        });
        self.status = ReceiverStatus::InitReceived;
        self.last_data = Some(Instant::now());

        if chunks == 0 {
            // Nothing to pull: acknowledge and deliver the empty payload.
            return self.complete_transfer();
        }

        let count = chunks.min(usize::from(self.config.chunks_per_request));
        vec![self.send_chunk_request(0, count)]
    }

    fn store_chunk(&mut self, chunk_id: usize, payload: &[u8]) -> Vec<ReceiverAction> {
        let transfer = match self.transfer.as_mut() {
            Some(t) => t,
            None => return Vec::new(),
        };

        if chunk_id >= transfer.plan.expected_chunks() {
            tracing::error!(
                chunk_id,
                expected_chunks = transfer.plan.expected_chunks(),
                "invalid chunk id"
            );
            return self.fail(ErrorCode::InvalidChunkId, chunk_id as u32);
        }

        if transfer.received_map[chunk_id] {
            tracing::error!(chunk_id, "duplicate chunk");
            return self.fail(ErrorCode::DuplicateChunk, chunk_id as u32);
        }

        let offset = chunk_id * transfer.plan.chunk_size();
        if offset + payload.len() > transfer.total_size as usize {
            tracing::error!(
                chunk_id,
                offset,
                len = payload.len(),
                total = transfer.total_size,
                "chunk would overflow receive buffer"
            );
            return self.fail(ErrorCode::BufferOverflow, chunk_id as u32);
        }

        let in_window = chunk_id >= transfer.batch_start && chunk_id <= transfer.batch_end;
        if !in_window {
            // Out-of-order across batches is tolerated; the chunk still
            // lands at its derived offset and counts toward totals.
            tracing::debug!(
                chunk_id,
                batch_start = transfer.batch_start,
                batch_end = transfer.batch_end,
                "chunk outside current batch window"
            );
        }
        if Some(payload.len()) != transfer.plan.len_of(chunk_id) {
            tracing::debug!(
                chunk_id,
                len = payload.len(),
                expected = transfer.plan.len_of(chunk_id),
                "chunk length differs from plan"
            );
        }

        transfer.buffer[offset..offset + payload.len()].copy_from_slice(payload);
        transfer.received_map[chunk_id] = true;
        transfer.received_count += 1;
        transfer.received_bytes += payload.len() as u32;
        if in_window {
            transfer.batch_received += 1;
        }

        tracing::trace!(
            chunk_id,
            received = transfer.received_count,
            expected = transfer.plan.expected_chunks(),
            "chunk stored"
        );

        self.status = ReceiverStatus::Receiving;
        self.last_data = Some(Instant::now());

        let expected_chunks = transfer.plan.expected_chunks();
        if transfer.received_count >= expected_chunks {
            return self.complete_transfer();
        }

        let batch_complete = transfer.batch_received >= transfer.expected_batch_size();
        if batch_complete && transfer.batch_end + 1 < expected_chunks {
            let next_start = transfer.batch_end + 1;
            let count =
                (expected_chunks - next_start).min(usize::from(self.config.chunks_per_request));
            return vec![self.send_chunk_request(next_start, count)];
        }

        Vec::new()
    }

    fn complete_transfer(&mut self) -> Vec<ReceiverAction> {
        let transfer = match self.transfer.take() {
            Some(t) => t,
            None => return Vec::new(),
        };
        self.last_data = None;
        self.status = ReceiverStatus::Complete;

        let jpeg_magic =
            transfer.buffer.len() >= 2 && transfer.buffer[0] == 0xFF && transfer.buffer[1] == 0xD8;

        tracing::info!(
            bytes = transfer.received_bytes,
            chunks = transfer.received_count,
            jpeg_magic,
            "transfer complete"
        );

        let seq = self.next_sequence();
        let ack = ControlMessage::transfer_complete_ack(seq, transfer.received_bytes).encode();

        vec![
            ReceiverAction::NotifyControl(ack.to_vec()),
            ReceiverAction::Deliver(CompletedTransfer {
                buffer: ReceivedBuffer::new(transfer.buffer),
                size: transfer.received_bytes,
                jpeg_magic,
            }),
            // Free the connection for a subsequent transfer.
            ReceiverAction::Disconnect,
        ]
    }

    fn send_chunk_request(&mut self, start: usize, count: usize) -> ReceiverAction {
        debug_assert!(count > 0);
        if let Some(transfer) = self.transfer.as_mut() {
            transfer.batch_start = start;
            transfer.batch_end = start + count - 1;
            transfer.batch_received = 0;
        }
        self.status = ReceiverStatus::Requesting;

        tracing::info!(start, count, "CHUNK_REQUEST");

        let seq = self.next_sequence();
        let frame = ControlMessage::chunk_request(seq, start as u32, count as u32).encode();
        ReceiverAction::NotifyControl(frame.to_vec())
    }

    /// Terminal failure: notify the peer once, release buffers, park in
    /// `Error` until disconnect or a fresh INIT.
    fn fail(&mut self, code: ErrorCode, context: u32) -> Vec<ReceiverAction> {
        tracing::error!(%code, context, "transfer error");

        self.reset_session();
        self.status = ReceiverStatus::Error;

        let seq = self.next_sequence();
        let frame = ControlMessage::transfer_error(seq, code, context).encode();
        vec![
            ReceiverAction::NotifyControl(frame.to_vec()),
            ReceiverAction::Failed(ReceiverError::Protocol { code, context }),
        ]
    }

    fn reset_session(&mut self) {
        if self.transfer.is_some() {
            tracing::debug!("releasing transfer buffers");
        }
        self.transfer = None;
        self.last_data = None;
        self.status = ReceiverStatus::Idle;
    }

    fn next_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }
}
