//! Transport over a pair of unbounded `futures` channels.
//!
//! [`channel_pair`] returns the client side, which implements
//! `TransportPort`, and the [`BackendEnd`] that a backend task reads
//! commands from and writes events to. Inbound events are handed to
//! subscribers by [`ChannelTransport::run_inbound`] (async, until the
//! backend hangs up) or [`ChannelTransport::pump_pending`] (whatever is
//! already queued).

use std::cell::{Cell, RefCell};
use async_trait::async_trait;
use futures::channel::mpsc::{self, TryRecvError};
use futures::StreamExt;
use chat_core::ports::{InboundHandler, Subscription, SubscriberList, TransportPort};
use chat_types::{error::ChatError, protocol::Envelope, Result};

/// The backend's side of the channel.
pub struct BackendEnd {
    pub commands: mpsc::UnboundedReceiver<Envelope>,
    pub events: mpsc::UnboundedSender<Envelope>,
}

pub struct ChannelTransport {
    outbound: RefCell<Option<mpsc::UnboundedSender<Envelope>>>,
    inbound: RefCell<Option<mpsc::UnboundedReceiver<Envelope>>>,
    ready: Cell<bool>,
    subscribers: SubscriberList,
}

pub fn channel_pair() -> (ChannelTransport, BackendEnd) {
    let (command_tx, command_rx) = mpsc::unbounded();
    let (event_tx, event_rx) = mpsc::unbounded();
    let transport = ChannelTransport {
        outbound: RefCell::new(Some(command_tx)),
        inbound: RefCell::new(Some(event_rx)),
        ready: Cell::new(false),
        subscribers: SubscriberList::new(),
    };
    let backend = BackendEnd {
        commands: command_rx,
        events: event_tx,
    };
    (transport, backend)
}

impl ChannelTransport {
    /// Deliver every envelope already queued by the backend without waiting.
    /// Returns how many were delivered.
    pub fn pump_pending(&self) -> usize {
        let mut queued = Vec::new();
        let mut closed = false;
        {
            let mut inbound = self.inbound.borrow_mut();
            let Some(rx) = inbound.as_mut() else {
                return 0;
            };
            loop {
                match rx.try_recv() {
                    Ok(envelope) => queued.push(envelope),
                    Err(TryRecvError::Closed) => {
                        closed = true;
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }
            if closed {
                inbound.take();
            }
        }
        for envelope in &queued {
            self.subscribers.deliver(envelope);
        }
        if closed {
            self.hung_up();
        }
        queued.len()
    }

    /// Deliver inbound envelopes as they arrive until the backend drops its
    /// event sender. Returns how many were delivered.
    pub async fn run_inbound(&self) -> Result<usize> {
        let mut rx = self
            .inbound
            .borrow_mut()
            .take()
            .ok_or_else(|| ChatError::Delivery("inbound channel already taken".to_string()))?;
        let mut delivered = 0;
        while let Some(envelope) = rx.next().await {
            self.subscribers.deliver(&envelope);
            delivered += 1;
        }
        self.hung_up();
        Ok(delivered)
    }

    fn hung_up(&self) {
        log::info!("Backend closed the event channel");
        self.ready.set(false);
    }
}

#[async_trait(?Send)]
impl TransportPort for ChannelTransport {
    async fn start(&self) -> Result<()> {
        if self.outbound.borrow().is_none() {
            return Err(ChatError::Delivery("channel closed by stop".to_string()));
        }
        self.ready.set(true);
        Ok(())
    }

    /// Drops the command sender, which ends the backend's command stream.
    async fn stop(&self) -> Result<()> {
        self.ready.set(false);
        self.outbound.borrow_mut().take();
        Ok(())
    }

    async fn send(&self, envelope: Envelope) -> Result<()> {
        if !self.ready.get() {
            return Err(ChatError::NotReady("channel not live".to_string()));
        }
        let outbound = self.outbound.borrow();
        let tx = outbound
            .as_ref()
            .ok_or_else(|| ChatError::NotReady("channel stopped".to_string()))?;
        tx.unbounded_send(envelope)
            .map_err(|e| ChatError::Delivery(format!("backend gone: {}", e)))
    }

    fn subscribe(&self, handler: InboundHandler) -> Subscription {
        self.subscribers.subscribe(handler)
    }

    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn name(&self) -> &str {
        "channel"
    }
}
