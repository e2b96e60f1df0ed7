//! End-to-end transfer tests: a sender and a receiver wired directly
//! together, with actions piped between them in FIFO order.

use std::collections::VecDeque;

use tinyflow_core::constants::ErrorCode;
use tinyflow_protocol::receiver::{
    CompletedTransfer, Receiver, ReceiverAction, ReceiverConfig, ReceiverStatus,
};
use tinyflow_protocol::sender::{Sender, SenderAction, SenderConfig, SenderStatus};
use tinyflow_protocol::stats::TransferStats;
use tinyflow_protocol::error::{ReceiverError, SenderError};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

enum Wire {
    ControlToReceiver(Vec<u8>),
    DataToReceiver(Vec<u8>),
    ControlToSender(Vec<u8>),
}

struct Harness {
    sender: Sender,
    receiver: Receiver,
    queue: VecDeque<Wire>,
    delivered: Option<CompletedTransfer>,
    completed: Option<TransferStats>,
    sender_error: Option<SenderError>,
    receiver_error: Option<ReceiverError>,
    progress: Vec<u32>,
    data_frames_sent: u32,
    chunk_requests: Vec<(u32, u32)>,
    disconnected: bool,
}

impl Harness {
    fn new(mtu: u16, chunks_per_request: u16) -> Self {
        let mut sender = Sender::new(SenderConfig::default());
        sender.on_mtu_changed(mtu);
        sender.on_connected();

        let mut receiver = Receiver::new(ReceiverConfig {
            chunks_per_request,
            ..ReceiverConfig::default()
        });
        receiver.on_connected();
        receiver.on_mtu_changed(mtu);

        Self {
            sender,
            receiver,
            queue: VecDeque::new(),
            delivered: None,
            completed: None,
            sender_error: None,
            receiver_error: None,
            progress: Vec::new(),
            data_frames_sent: 0,
            chunk_requests: Vec::new(),
            disconnected: false,
        }
    }

    fn absorb_sender(&mut self, actions: Vec<SenderAction>) {
        for action in actions {
            match action {
                SenderAction::SendControl(frame) => {
                    self.queue.push_back(Wire::ControlToReceiver(frame));
                }
                SenderAction::SendData(frame) => {
                    self.data_frames_sent += 1;
                    self.queue.push_back(Wire::DataToReceiver(frame));
                }
                SenderAction::Progress { chunks_sent, .. } => self.progress.push(chunks_sent),
                SenderAction::Completed(stats) => self.completed = Some(stats),
                SenderAction::Failed(err) => self.sender_error = Some(err),
                SenderAction::DeviceInfo(_) => {}
                SenderAction::Disconnect => self.disconnect(),
            }
        }
    }

    fn absorb_receiver(&mut self, actions: Vec<ReceiverAction>) {
        for action in actions {
            match action {
                ReceiverAction::NotifyControl(frame) => {
                    if let Ok(msg) = tinyflow_core::control::ControlMessage::decode(&frame) {
                        if msg.command == tinyflow_core::constants::Command::ChunkRequest {
                            self.chunk_requests.push((msg.param1, msg.param2));
                        }
                    }
                    self.queue.push_back(Wire::ControlToSender(frame));
                }
                ReceiverAction::Deliver(done) => self.delivered = Some(done),
                ReceiverAction::Failed(err) => self.receiver_error = Some(err),
                ReceiverAction::Disconnect => self.disconnect(),
            }
        }
    }

    fn disconnect(&mut self) {
        // Deliver everything still in flight before tearing down, the way
        // an ordered transport drains its queues.
        self.drain();
        self.disconnected = true;
    }

    fn drain(&mut self) {
        while let Some(wire) = self.queue.pop_front() {
            match wire {
                Wire::ControlToReceiver(frame) => {
                    let actions = self.receiver.on_control_frame(&frame);
                    self.absorb_receiver(actions);
                }
                Wire::DataToReceiver(frame) => {
                    let actions = self.receiver.on_data_frame(&frame);
                    self.absorb_receiver(actions);
                }
                Wire::ControlToSender(frame) => {
                    let actions = self.sender.on_control_frame(&frame);
                    self.absorb_sender(actions);
                }
            }
        }
    }

    /// Run a full transfer to quiescence.
    fn transfer(&mut self, payload: Vec<u8>) {
        let actions = self.sender.transfer_file(payload);
        self.absorb_sender(actions);
        self.drain();
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn roundtrip_small_payload() {
    let payload = pattern(1010);
    let mut h = Harness::new(512, 40);
    h.transfer(payload.clone());

    let done = h.delivered.expect("payload delivered");
    assert_eq!(done.buffer.as_slice(), &payload[..]);
    assert_eq!(done.size, 1010);

    let stats = h.completed.expect("sender completed");
    assert_eq!(stats.bytes, 1010);
    assert_eq!(h.sender.status(), SenderStatus::Completed);
    assert_eq!(h.receiver.status(), ReceiverStatus::Complete);
    // The receiver frees the connection for a subsequent transfer.
    assert!(h.disconnected);
}

#[test]
fn roundtrip_across_mtus() {
    for mtu in [23u16, 100, 185, 247, 512] {
        let payload = pattern(3_000);
        let mut h = Harness::new(mtu, 40);
        h.transfer(payload.clone());

        let done = h.delivered.unwrap_or_else(|| panic!("no delivery at mtu {mtu}"));
        assert_eq!(done.buffer.as_slice(), &payload[..], "corrupt payload at mtu {mtu}");
        assert!(h.sender_error.is_none());
        assert!(h.receiver_error.is_none());
    }
}

#[test]
fn roundtrip_various_sizes() {
    for size in [1usize, 16, 505, 506, 1000, 4096, 20200, 65_537] {
        let payload = pattern(size);
        let mut h = Harness::new(512, 40);
        h.transfer(payload.clone());

        let done = h.delivered.unwrap_or_else(|| panic!("no delivery at size {size}"));
        assert_eq!(done.size as usize, size);
        assert_eq!(done.buffer.as_slice(), &payload[..], "corrupt payload at size {size}");
    }
}

// ---------------------------------------------------------------------------
// Boundary scenarios
// ---------------------------------------------------------------------------

#[test]
fn empty_payload_completes_without_data_packets() {
    let mut h = Harness::new(512, 40);
    h.transfer(Vec::new());

    assert_eq!(h.data_frames_sent, 0);
    assert!(h.chunk_requests.is_empty());

    let done = h.delivered.expect("empty payload delivered");
    assert_eq!(done.size, 0);
    assert!(done.buffer.is_empty());

    let stats = h.completed.expect("sender completed");
    assert_eq!(stats.bytes, 0);
    assert_eq!(stats.chunks, 0);
}

#[test]
fn single_byte_payload() {
    let mut h = Harness::new(512, 40);
    h.transfer(vec![0x42]);

    assert_eq!(h.data_frames_sent, 1);
    let done = h.delivered.expect("delivered");
    assert_eq!(done.buffer.as_slice(), &[0x42]);
}

#[test]
fn exactly_one_full_chunk() {
    let payload = pattern(505);
    let mut h = Harness::new(512, 40);
    h.transfer(payload.clone());

    assert_eq!(h.data_frames_sent, 1);
    assert_eq!(h.chunk_requests, vec![(0, 1)]);
    assert_eq!(h.delivered.unwrap().buffer.as_slice(), &payload[..]);
}

#[test]
fn one_full_chunk_plus_one_byte() {
    let payload = pattern(506);
    let mut h = Harness::new(512, 40);
    h.transfer(payload.clone());

    assert_eq!(h.data_frames_sent, 2);
    assert_eq!(h.delivered.unwrap().buffer.as_slice(), &payload[..]);
}

#[test]
fn forty_chunks_fill_one_batch_exactly() {
    // 20200 bytes at MTU 512 = exactly 40 chunks of 505.
    let payload = pattern(20_200);
    let mut h = Harness::new(512, 40);
    h.transfer(payload.clone());

    assert_eq!(h.data_frames_sent, 40);
    // The first request covers the whole transfer; no second batch exists.
    assert_eq!(h.chunk_requests, vec![(0, 40)]);
    assert_eq!(h.delivered.unwrap().buffer.as_slice(), &payload[..]);
}

#[test]
fn second_batch_requests_the_remainder() {
    // 45 chunks at batch size 40: the second request asks for the last 5.
    let payload = pattern(45 * 505);
    let mut h = Harness::new(512, 40);
    h.transfer(payload.clone());

    assert_eq!(h.chunk_requests, vec![(0, 40), (40, 5)]);
    assert_eq!(h.delivered.unwrap().buffer.as_slice(), &payload[..]);
}

#[test]
fn legacy_batch_size_twenty() {
    let payload = pattern(25 * 505);
    let mut h = Harness::new(512, 20);
    h.transfer(payload.clone());

    assert_eq!(h.chunk_requests, vec![(0, 20), (20, 5)]);
    assert_eq!(h.delivered.unwrap().buffer.as_slice(), &payload[..]);
}

#[test]
fn duplicate_chunk_fails_both_peers() {
    let mut sender = Sender::new(SenderConfig::default());
    sender.on_mtu_changed(512);
    sender.on_connected();

    let mut receiver = Receiver::new(ReceiverConfig::default());
    receiver.on_mtu_changed(512);

    // INIT → first chunk request.
    let init = match &sender.transfer_file(pattern(6 * 505))[0] {
        SenderAction::SendControl(frame) => frame.clone(),
        other => panic!("expected SendControl, got {other:?}"),
    };
    let request = match &receiver.on_control_frame(&init)[0] {
        ReceiverAction::NotifyControl(frame) => frame.clone(),
        other => panic!("expected NotifyControl, got {other:?}"),
    };

    // Pick out chunk 5 and feed it twice.
    let chunk5 = sender
        .on_control_frame(&request)
        .into_iter()
        .filter_map(|a| match a {
            SenderAction::SendData(frame) => Some(frame),
            _ => None,
        })
        .nth(5)
        .expect("chunk 5 streamed");

    assert!(receiver.on_data_frame(&chunk5).is_empty());
    let errors = receiver.on_data_frame(&chunk5);
    let error_frame = match &errors[0] {
        ReceiverAction::NotifyControl(frame) => frame.clone(),
        other => panic!("expected NotifyControl, got {other:?}"),
    };
    assert!(matches!(
        &errors[1],
        ReceiverAction::Failed(ReceiverError::Protocol {
            code: ErrorCode::DuplicateChunk,
            ..
        })
    ));
    assert_eq!(receiver.status(), ReceiverStatus::Error);

    let failed = sender.on_control_frame(&error_frame);
    assert!(matches!(
        &failed[0],
        SenderAction::Failed(SenderError::Peer(ErrorCode::DuplicateChunk))
    ));
    assert_eq!(sender.status(), SenderStatus::Failed);
}

#[test]
fn oversized_file_never_touches_the_wire() {
    let mut h = Harness::new(512, 40);
    h.transfer(vec![0u8; (tinyflow_core::constants::MAX_TRANSFER_SIZE + 1) as usize]);

    assert!(matches!(
        h.sender_error,
        Some(SenderError::FileTooLarge { .. })
    ));
    assert_eq!(h.data_frames_sent, 0);
    assert!(h.chunk_requests.is_empty());
    assert_eq!(h.receiver.status(), ReceiverStatus::Idle);
}

#[test]
fn out_of_order_batch_reassembles_correctly() {
    let mut sender = Sender::new(SenderConfig::default());
    sender.on_mtu_changed(512);
    sender.on_connected();

    let mut receiver = Receiver::new(ReceiverConfig::default());
    receiver.on_mtu_changed(512);

    let payload = pattern(4 * 505 + 17);
    let init = match &sender.transfer_file(payload.clone())[0] {
        SenderAction::SendControl(frame) => frame.clone(),
        other => panic!("expected SendControl, got {other:?}"),
    };
    let request = match &receiver.on_control_frame(&init)[0] {
        ReceiverAction::NotifyControl(frame) => frame.clone(),
        other => panic!("expected NotifyControl, got {other:?}"),
    };

    let mut frames: Vec<Vec<u8>> = sender
        .on_control_frame(&request)
        .into_iter()
        .filter_map(|a| match a {
            SenderAction::SendData(frame) => Some(frame),
            _ => None,
        })
        .collect();
    frames.reverse();

    let mut delivered = None;
    for frame in &frames {
        for action in receiver.on_data_frame(frame) {
            if let ReceiverAction::Deliver(done) = action {
                delivered = Some(done);
            }
        }
    }

    let done = delivered.expect("reordered batch still completes");
    assert_eq!(done.buffer.as_slice(), &payload[..]);
}

// ---------------------------------------------------------------------------
// Teardown properties
// ---------------------------------------------------------------------------

#[test]
fn disconnect_mid_transfer_returns_both_to_idle() {
    let mut sender = Sender::new(SenderConfig::default());
    sender.on_mtu_changed(512);
    sender.on_connected();

    let mut receiver = Receiver::new(ReceiverConfig::default());
    receiver.on_mtu_changed(512);

    let init = match &sender.transfer_file(pattern(10 * 505))[0] {
        SenderAction::SendControl(frame) => frame.clone(),
        other => panic!("expected SendControl, got {other:?}"),
    };
    receiver.on_control_frame(&init);
    assert_eq!(receiver.status(), ReceiverStatus::Requesting);

    sender.on_disconnected();
    receiver.on_disconnected();

    assert_eq!(sender.status(), SenderStatus::Idle);
    assert_eq!(receiver.status(), ReceiverStatus::Idle);
    assert_eq!(receiver.received_bytes(), 0);
    assert_eq!(receiver.total_size(), 0);
}

#[test]
fn progress_reports_reach_the_application() {
    let payload = pattern(12 * 505);
    let mut h = Harness::new(512, 40);
    h.transfer(payload);

    assert_eq!(h.progress, vec![5, 10, 12]);
}

#[test]
fn received_buffer_release_contract() {
    let mut h = Harness::new(512, 40);
    h.transfer(pattern(100));

    let mut done = h.delivered.expect("delivered");
    assert_eq!(done.buffer.len(), 100);
    done.buffer.release();
    assert!(done.buffer.is_released());
    done.buffer.release(); // no-op
}
