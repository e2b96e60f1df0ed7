//! Per-peer runtime services.
//!
//! Each service owns its state machine (via [`EventMux`]), its transport
//! handle, and the inbound event queue. Events are dispatched one at a time
//! from a single task, giving the state machine the serialized execution
//! context the protocol requires; a coarse one-second tick drives the
//! inactivity timeout.

use std::time::Duration;

use tokio::sync::mpsc;

use tinyflow_interfaces::FrameTransport;
use tinyflow_protocol::mux::{EventMux, TransportEvent};
use tinyflow_protocol::receiver::{CompletedTransfer, Receiver, ReceiverAction};
use tinyflow_protocol::sender::{Sender, SenderAction};
use tinyflow_protocol::stats::TransferStats;

use crate::error::NodeError;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Receiver service
// ---------------------------------------------------------------------------

/// Runs the receiving peer until the session ends.
pub struct ReceiverService<T: FrameTransport> {
    mux: EventMux<Receiver>,
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl<T: FrameTransport> ReceiverService<T> {
    pub fn new(
        receiver: Receiver,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            mux: EventMux::new(receiver),
            transport,
            events,
        }
    }

    /// Pump events until the link closes. Returns the delivered transfer,
    /// if any completed.
    pub async fn run(mut self) -> Result<Option<CompletedTransfer>, NodeError> {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        let mut delivered = None;

        loop {
            tokio::select! {
                maybe = self.events.recv() => {
                    let event = match maybe {
                        Some(event) => event,
                        None => return Ok(delivered),
                    };
                    let disconnected = matches!(event, TransportEvent::Disconnected);
                    let actions = self.mux.dispatch(event);
                    self.execute(actions, &mut delivered)?;
                    if disconnected {
                        return Ok(delivered);
                    }
                }
                _ = ticker.tick() => {
                    let actions = self.mux.tick();
                    self.execute(actions, &mut delivered)?;
                }
            }
        }
    }

    fn execute(
        &mut self,
        actions: Vec<ReceiverAction>,
        delivered: &mut Option<CompletedTransfer>,
    ) -> Result<(), NodeError> {
        for action in actions {
            match action {
                ReceiverAction::NotifyControl(frame) => {
                    if let Err(e) = self.transport.notify_control(&frame) {
                        tracing::warn!(error = %e, "control notification failed");
                        let followup = self.mux.dispatch(TransportEvent::NotifyRejected);
                        self.execute(followup, delivered)?;
                    }
                }
                ReceiverAction::Deliver(done) => {
                    tracing::info!(
                        bytes = done.size,
                        jpeg_magic = done.jpeg_magic,
                        "transfer delivered"
                    );
                    *delivered = Some(done);
                }
                ReceiverAction::Failed(err) => {
                    let _ = self.transport.disconnect();
                    return Err(NodeError::Receiver(err));
                }
                ReceiverAction::Disconnect => {
                    let _ = self.transport.disconnect();
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sender service
// ---------------------------------------------------------------------------

/// Runs the sending peer for one transfer.
pub struct SenderService<T: FrameTransport> {
    mux: EventMux<Sender>,
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl<T: FrameTransport> SenderService<T> {
    pub fn new(
        sender: Sender,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            mux: EventMux::new(sender),
            transport,
            events,
        }
    }

    /// Transfer `payload` and wait for the receiver's acknowledgment.
    pub async fn transfer(mut self, payload: Vec<u8>) -> Result<TransferStats, NodeError> {
        let actions = self.mux.handler_mut().transfer_file(payload);
        if let Some(stats) = self.execute(actions)? {
            return Ok(stats);
        }

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                maybe = self.events.recv() => {
                    let event = match maybe {
                        Some(event) => event,
                        None => return Err(NodeError::LinkClosed),
                    };
                    let disconnected = matches!(event, TransportEvent::Disconnected);
                    let actions = self.mux.dispatch(event);
                    if let Some(stats) = self.execute(actions)? {
                        return Ok(stats);
                    }
                    if disconnected {
                        return Err(NodeError::LinkClosed);
                    }
                }
                _ = ticker.tick() => {
                    let actions = self.mux.tick();
                    if let Some(stats) = self.execute(actions)? {
                        return Ok(stats);
                    }
                }
            }
        }
    }

    fn execute(&mut self, actions: Vec<SenderAction>) -> Result<Option<TransferStats>, NodeError> {
        let mut completed = None;
        for action in actions {
            match action {
                SenderAction::SendControl(frame) => {
                    if let Err(e) = self.transport.send_control(&frame) {
                        let _ = self.transport.disconnect();
                        return Err(NodeError::Transport(e));
                    }
                }
                SenderAction::SendData(frame) => {
                    if let Err(e) = self.transport.send_data(&frame) {
                        let _ = self.transport.disconnect();
                        return Err(NodeError::Transport(e));
                    }
                }
                SenderAction::Disconnect => {
                    let _ = self.transport.disconnect();
                }
                SenderAction::Progress {
                    chunks_sent,
                    total_chunks,
                    bytes_sent,
                } => {
                    tracing::info!(chunks_sent, total_chunks, bytes_sent, "progress");
                }
                SenderAction::DeviceInfo(info) => {
                    tracing::info!(?info, "peer device info");
                }
                SenderAction::Completed(stats) => {
                    completed = Some(stats);
                }
                SenderAction::Failed(err) => {
                    let _ = self.transport.disconnect();
                    return Err(NodeError::Sender(err));
                }
            }
        }
        Ok(completed)
    }
}
