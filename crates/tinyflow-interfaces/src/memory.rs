//! In-memory loopback link.
//!
//! [`MemoryLink::new`] builds a connected central/peripheral endpoint pair
//! backed by unbounded channels, with FIFO order per characteristic and a
//! fixed negotiated MTU. Both event queues are seeded with `MtuChanged`
//! followed by `Connected`, mirroring a link whose MTU exchange completes
//! before the engine is told it is ready.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use tinyflow_core::constants::{ATT_HEADER_SIZE, CONTROL_MSG_SIZE};
use tinyflow_protocol::mux::TransportEvent;

use crate::error::TransportError;
use crate::traits::FrameTransport;

/// A connected loopback pair plus the inbound event queue of each side.
pub struct MemoryLink {
    pub central: MemoryEndpoint,
    pub central_events: mpsc::UnboundedReceiver<TransportEvent>,
    pub peripheral: MemoryEndpoint,
    pub peripheral_events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl MemoryLink {
    pub fn new(mtu: u16) -> Self {
        let (to_central, central_events) = mpsc::unbounded_channel();
        let (to_peripheral, peripheral_events) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        for tx in [&to_central, &to_peripheral] {
            let _ = tx.send(TransportEvent::MtuChanged(mtu));
            let _ = tx.send(TransportEvent::Connected);
        }

        let central = MemoryEndpoint {
            name: "MemoryLink[central]",
            mtu,
            connected: Arc::clone(&connected),
            to_peer: to_peripheral.clone(),
            to_self: to_central.clone(),
        };
        let peripheral = MemoryEndpoint {
            name: "MemoryLink[peripheral]",
            mtu,
            connected,
            to_peer: to_central,
            to_self: to_peripheral,
        };

        Self {
            central,
            central_events,
            peripheral,
            peripheral_events,
        }
    }
}

/// One side of a [`MemoryLink`].
pub struct MemoryEndpoint {
    name: &'static str,
    mtu: u16,
    connected: Arc<AtomicBool>,
    to_peer: mpsc::UnboundedSender<TransportEvent>,
    to_self: mpsc::UnboundedSender<TransportEvent>,
}

impl MemoryEndpoint {
    fn deliver(&self, event: TransportEvent) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.to_peer
            .send(event)
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn check_len(&self, len: usize, max: usize) -> Result<(), TransportError> {
        if len > max {
            return Err(TransportError::FrameTooLarge { len, max });
        }
        Ok(())
    }
}

impl FrameTransport for MemoryEndpoint {
    fn name(&self) -> &str {
        self.name
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_control(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.check_len(frame.len(), CONTROL_MSG_SIZE)?;
        tracing::trace!(endpoint = self.name, len = frame.len(), "control write");
        self.deliver(TransportEvent::ControlFrame(frame.to_vec()))
    }

    fn notify_control(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.check_len(frame.len(), CONTROL_MSG_SIZE)?;
        tracing::trace!(endpoint = self.name, len = frame.len(), "control notify");
        self.deliver(TransportEvent::ControlFrame(frame.to_vec()))
    }

    fn send_data(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let max = usize::from(self.mtu).saturating_sub(ATT_HEADER_SIZE);
        self.check_len(frame.len(), max)?;
        tracing::trace!(endpoint = self.name, len = frame.len(), "data write");
        self.deliver(TransportEvent::DataFrame(frame.to_vec()))
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(endpoint = self.name, "link disconnected");
        let _ = self.to_peer.send(TransportEvent::Disconnected);
        let _ = self.to_self.send(TransportEvent::Disconnected);
        Ok(())
    }
}
