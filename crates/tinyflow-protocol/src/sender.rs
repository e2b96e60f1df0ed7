//! Sender-side transfer state machine.
//!
//! The sender (BLE central) announces a transfer with TRANSFER_INIT, then
//! services the receiver's CHUNK_REQUESTs by streaming the requested
//! contiguous range on the data channel with write-without-response. The
//! session ends on the receiver's TRANSFER_COMPLETE_ACK, a TRANSFER_ERROR,
//! or the inactivity timeout.
//!
//! States: `Idle → Connecting → SendingInit → WaitingForRequest →
//! SendingData → Completed`, or `Failed` on error. Like the receiver, the
//! machine performs no I/O: events in, actions out.

use std::time::{Duration, Instant};

use tinyflow_core::constants::{Command, DEFAULT_MTU, ErrorCode, MAX_TRANSFER_SIZE};
use tinyflow_core::control::{ControlMessage, DeviceInfo};
use tinyflow_core::data::DataChunk;

use crate::constants::{PROGRESS_STRIDE, TRANSFER_TIMEOUT};
use crate::error::SenderError;
use crate::packetize::{self, ChunkPlan};
use crate::stats::TransferStats;
use crate::timeout::timed_out;

/// Sender tuning knobs.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Upper bound on an outbound payload, enforced before touching the
    /// transport. Aligned with the receiver's limit.
    pub max_file_size: u32,
    /// Inactivity timeout, reset by every inbound control frame.
    pub timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_TRANSFER_SIZE,
            timeout: TRANSFER_TIMEOUT,
        }
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderStatus {
    Idle,
    Connecting,
    SendingInit,
    WaitingForRequest,
    SendingData,
    Completed,
    Failed,
}

/// Host-executed outcome of a sender event.
#[derive(Debug)]
pub enum SenderAction {
    /// Write-with-response on the control characteristic.
    SendControl(Vec<u8>),
    /// Write-without-response on the data characteristic.
    SendData(Vec<u8>),
    /// Tear the connection down.
    Disconnect,
    /// Coalesced progress report for the application.
    Progress {
        chunks_sent: u32,
        total_chunks: u32,
        bytes_sent: u32,
    },
    /// The receiver acknowledged the full payload.
    Completed(TransferStats),
    /// Terminal session failure.
    Failed(SenderError),
    /// Advisory device description forwarded from the receiver.
    DeviceInfo(DeviceInfo),
}

/// State of the in-flight outbound transfer.
struct OutboundTransfer {
    payload: Vec<u8>,
    plan: ChunkPlan,
    chunks_sent: u32,
    bytes_sent: u32,
    started: Instant,
}

/// The sender-side protocol state machine.
pub struct Sender {
    config: SenderConfig,
    mtu: u16,
    sequence: u16,
    status: SenderStatus,
    connected: bool,
    transfer: Option<OutboundTransfer>,
    /// Reset by every inbound control frame while a session is active.
    last_control: Option<Instant>,
}

impl Sender {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            mtu: DEFAULT_MTU,
            sequence: 0,
            status: SenderStatus::Idle,
            connected: false,
            transfer: None,
            last_control: None,
        }
    }

    pub fn status(&self) -> SenderStatus {
        self.status
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Snapshot of the active or most recent session.
    pub fn stats(&self) -> TransferStats {
        self.transfer.as_ref().map_or_else(TransferStats::default, |t| TransferStats {
            bytes: t.bytes_sent,
            chunks: t.chunks_sent,
            elapsed: t.started.elapsed(),
        })
    }

    // ------------------------------------------------------------------ //
    // Application interface
    // ------------------------------------------------------------------ //

    /// Start a transfer. Fails locally when the payload exceeds the
    /// configured limit; parks in `Connecting` when the transport is not
    /// ready yet.
    pub fn transfer_file(&mut self, payload: Vec<u8>) -> Vec<SenderAction> {
        if payload.len() > self.config.max_file_size as usize {
            tracing::error!(
                size = payload.len(),
                max = self.config.max_file_size,
                "file too large"
            );
            self.status = SenderStatus::Failed;
            return vec![SenderAction::Failed(SenderError::FileTooLarge {
                size: payload.len(),
                max: self.config.max_file_size as usize,
            })];
        }

        if self.transfer.is_some() {
            tracing::warn!("transfer already in progress, replacing");
        }

        self.transfer = Some(OutboundTransfer {
            payload,
            // Chunked once the MTU is final, at INIT time.
            plan: ChunkPlan::new(0, 1).expect("empty plan"),
            chunks_sent: 0,
            bytes_sent: 0,
            started: Instant::now(),
        });

        if !self.connected {
            tracing::info!("transport not ready, waiting for connection");
            self.status = SenderStatus::Connecting;
            return Vec::new();
        }

        self.send_init()
    }

    /// Abort the transfer and drop all session state.
    pub fn cancel(&mut self) -> Vec<SenderAction> {
        if self.transfer.is_none() {
            return Vec::new();
        }
        tracing::info!("transfer cancelled");
        self.transfer = None;
        self.last_control = None;
        self.status = SenderStatus::Idle;
        vec![SenderAction::Disconnect]
    }

    // ------------------------------------------------------------------ //
    // Transport events
    // ------------------------------------------------------------------ //

    /// The transport is ready: control notifications subscribed and the
    /// data characteristic known.
    pub fn on_connected(&mut self) -> Vec<SenderAction> {
        tracing::info!("sender connected");
        self.connected = true;
        if self.status == SenderStatus::Connecting {
            return self.send_init();
        }
        Vec::new()
    }

    pub fn on_mtu_changed(&mut self, mtu: u16) {
        tracing::debug!(mtu, "MTU updated");
        self.mtu = mtu;
    }

    /// Connection lost: abandon any pending work.
    pub fn on_disconnected(&mut self) {
        tracing::info!("sender disconnected");
        self.connected = false;
        self.mtu = DEFAULT_MTU;
        self.transfer = None;
        self.last_control = None;
        self.status = SenderStatus::Idle;
    }

    /// An inbound control notification from the receiver.
    pub fn on_control_frame(&mut self, frame: &[u8]) -> Vec<SenderAction> {
        let msg = match ControlMessage::decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                // TRANSFER_ERROR flows receiver → sender only, so a
                // malformed inbound frame is logged and dropped.
                tracing::warn!(error = %e, "dropping malformed control frame");
                return Vec::new();
            }
        };

        tracing::debug!(
            command = ?msg.command,
            sequence = msg.sequence,
            p1 = msg.param1,
            p2 = msg.param2,
            "control notification"
        );

        self.last_control = Some(Instant::now());

        match msg.command {
            Command::ChunkRequest => self.handle_chunk_request(msg.param1, msg.param2),
            Command::TransferCompleteAck => self.handle_complete_ack(msg.param1),
            Command::TransferError => self.handle_transfer_error(msg.param1, msg.param2),
            Command::DeviceInfo => {
                let info = DeviceInfo::from_params(msg.param1, msg.param2);
                tracing::info!(?info, "device info received");
                vec![SenderAction::DeviceInfo(info)]
            }
            Command::TransferInit => {
                tracing::warn!("unexpected TRANSFER_INIT from receiver, ignoring");
                Vec::new()
            }
        }
    }

    /// Periodic poll for the coarse inactivity timeout.
    pub fn on_tick(&mut self) -> Vec<SenderAction> {
        let expired = match self.last_control {
            Some(last)
                if matches!(
                    self.status,
                    SenderStatus::WaitingForRequest | SenderStatus::SendingData
                ) =>
            {
                timed_out(last.elapsed(), self.config.timeout)
            }
            _ => false,
        };
        if !expired {
            return Vec::new();
        }

        tracing::error!(timeout = ?self.config.timeout, "no control frame from receiver");
        self.transfer = None;
        self.last_control = None;
        self.status = SenderStatus::Failed;
        vec![SenderAction::Failed(SenderError::Timeout)]
    }

    // ------------------------------------------------------------------ //
    // Protocol handlers
    // ------------------------------------------------------------------ //

    fn send_init(&mut self) -> Vec<SenderAction> {
        let chunk_size = packetize::max_payload(self.mtu);
        if chunk_size == 0 {
            tracing::error!(mtu = self.mtu, "MTU too small for data payload");
            self.transfer = None;
            self.status = SenderStatus::Failed;
            return vec![SenderAction::Failed(SenderError::MtuTooSmall { mtu: self.mtu })];
        }

        let transfer = match self.transfer.as_mut() {
            Some(t) => t,
            None => return Vec::new(),
        };

        self.status = SenderStatus::SendingInit;

        let total = transfer.payload.len();
        transfer.plan = ChunkPlan::new(total, chunk_size).expect("chunk_size checked non-zero");
        transfer.started = Instant::now();

        let chunks = transfer.plan.expected_chunks();
        tracing::info!(
            total_size = total,
            chunk_size,
            expected_chunks = chunks,
            "TRANSFER_INIT"
        );

        self.sequence = self.sequence.wrapping_add(1);
        let frame = ControlMessage::transfer_init(
            self.sequence,
            total as u32,
            chunk_size as u32,
            chunks as u32,
        )
        .encode();

        self.status = SenderStatus::WaitingForRequest;
        self.last_control = Some(Instant::now());

        vec![SenderAction::SendControl(frame.to_vec())]
    }

    fn handle_chunk_request(&mut self, start: u32, count: u32) -> Vec<SenderAction> {
        if !matches!(
            self.status,
            SenderStatus::WaitingForRequest | SenderStatus::SendingData
        ) {
            tracing::warn!(status = ?self.status, "CHUNK_REQUEST in wrong state, ignoring");
            return Vec::new();
        }

        let transfer = match self.transfer.as_mut() {
            Some(t) => t,
            None => return Vec::new(),
        };

        let total_chunks = transfer.plan.expected_chunks();
        let start = start as usize;
        if start >= total_chunks {
            tracing::warn!(start, total_chunks, "CHUNK_REQUEST past end, ignoring");
            return Vec::new();
        }

        // Clamp a range that extends past the final chunk.
        let end = (start + count as usize).min(total_chunks);
        tracing::info!(start, end, "servicing CHUNK_REQUEST");

        self.status = SenderStatus::SendingData;

        let mut actions = Vec::with_capacity(end - start + 2);
        for id in start..end {
            let range = transfer.plan.bounds(id).expect("id in range");
            let chunk = &transfer.payload[range];
            let frame = DataChunk::encode(id as u16, chunk).expect("chunk fits length field");
            actions.push(SenderAction::SendData(frame));

            transfer.chunks_sent += 1;
            transfer.bytes_sent += chunk.len() as u32;

            let batch_done = id + 1 == end;
            if transfer.chunks_sent % PROGRESS_STRIDE == 0 || batch_done {
                actions.push(SenderAction::Progress {
                    chunks_sent: transfer.chunks_sent,
                    total_chunks: total_chunks as u32,
                    bytes_sent: transfer.bytes_sent,
                });
            }
        }

        self.status = SenderStatus::WaitingForRequest;
        actions
    }

    fn handle_complete_ack(&mut self, received_size: u32) -> Vec<SenderAction> {
        if !matches!(
            self.status,
            SenderStatus::WaitingForRequest | SenderStatus::SendingData
        ) {
            tracing::warn!(status = ?self.status, "ACK in wrong state, ignoring");
            return Vec::new();
        }

        let transfer = match self.transfer.take() {
            Some(t) => t,
            None => return Vec::new(),
        };
        self.last_control = None;
        self.status = SenderStatus::Completed;

        let stats = TransferStats {
            bytes: received_size,
            chunks: transfer.chunks_sent,
            elapsed: transfer.started.elapsed(),
        };

        tracing::info!(
            bytes = stats.bytes,
            elapsed = ?stats.elapsed,
            throughput_bps = stats.throughput_bps(),
            "transfer acknowledged"
        );

        vec![SenderAction::Completed(stats)]
    }

    fn handle_transfer_error(&mut self, code: u32, context: u32) -> Vec<SenderAction> {
        let code = match ErrorCode::from_u32(code) {
            Ok(code) => code,
            Err(_) => {
                tracing::warn!(raw = code, "unknown error code from receiver");
                ErrorCode::UnknownError
            }
        };

        tracing::error!(%code, context, "receiver reported transfer error");

        self.transfer = None;
        self.last_control = None;
        self.status = SenderStatus::Failed;
        vec![SenderAction::Failed(SenderError::Peer(code))]
    }
}
