//! Transport event dispatch.
//!
//! [`EventMux`] is the single entry point for inbound transport events. It
//! owns the peer state machine exclusively, so protocol events reach the
//! machine one at a time regardless of the transport's threading model: a
//! host that funnels all events through one mux from one task gets the
//! serialized delivery the protocol requires for free.

use crate::receiver::{Receiver, ReceiverAction};
use crate::sender::{Sender, SenderAction};

/// An inbound event from the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established and characteristics ready.
    Connected,
    /// Connection lost.
    Disconnected,
    /// MTU negotiation completed.
    MtuChanged(u16),
    /// A frame arrived on the control characteristic.
    ControlFrame(Vec<u8>),
    /// A frame arrived on the data characteristic.
    DataFrame(Vec<u8>),
    /// The transport refused to deliver a queued notification.
    NotifyRejected,
}

/// A peer state machine that consumes transport events.
pub trait SessionHandler {
    type Action;

    fn on_event(&mut self, event: TransportEvent) -> Vec<Self::Action>;

    /// Periodic poll for inactivity timeouts.
    fn on_tick(&mut self) -> Vec<Self::Action>;
}

impl SessionHandler for Receiver {
    type Action = ReceiverAction;

    fn on_event(&mut self, event: TransportEvent) -> Vec<ReceiverAction> {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Disconnected => {
                self.on_disconnected();
                Vec::new()
            }
            TransportEvent::MtuChanged(mtu) => {
                self.on_mtu_changed(mtu);
                Vec::new()
            }
            TransportEvent::ControlFrame(frame) => self.on_control_frame(&frame),
            TransportEvent::DataFrame(frame) => self.on_data_frame(&frame),
            TransportEvent::NotifyRejected => self.on_notify_rejected(),
        }
    }

    fn on_tick(&mut self) -> Vec<ReceiverAction> {
        Receiver::on_tick(self)
    }
}

impl SessionHandler for Sender {
    type Action = SenderAction;

    fn on_event(&mut self, event: TransportEvent) -> Vec<SenderAction> {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Disconnected => {
                self.on_disconnected();
                Vec::new()
            }
            TransportEvent::MtuChanged(mtu) => {
                self.on_mtu_changed(mtu);
                Vec::new()
            }
            TransportEvent::ControlFrame(frame) => self.on_control_frame(&frame),
            TransportEvent::DataFrame(frame) => {
                tracing::warn!(len = frame.len(), "sender received unexpected data frame");
                Vec::new()
            }
            // Write-with-response failures surface as transport errors on
            // the sender side, not as rejected notifications.
            TransportEvent::NotifyRejected => Vec::new(),
        }
    }

    fn on_tick(&mut self) -> Vec<SenderAction> {
        Sender::on_tick(self)
    }
}

/// Exclusive owner of one peer state machine.
pub struct EventMux<H: SessionHandler> {
    handler: H,
}

impl<H: SessionHandler> EventMux<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Route one transport event into the state machine.
    pub fn dispatch(&mut self, event: TransportEvent) -> Vec<H::Action> {
        tracing::trace!(event = ?std::mem::discriminant(&event), "dispatching transport event");
        self.handler.on_event(event)
    }

    /// Run the periodic timeout poll.
    pub fn tick(&mut self) -> Vec<H::Action> {
        self.handler.on_tick()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
