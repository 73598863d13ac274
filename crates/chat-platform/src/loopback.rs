//! In-memory loopback transport.
//! Records every outbound envelope and lets the host push inbound ones.
//! With a [`Responder`] attached it answers commands itself.

use std::cell::{Cell, RefCell};
use async_trait::async_trait;
use chat_core::ports::{InboundHandler, Subscription, SubscriberList, TransportPort};
use chat_types::{
    error::ChatError,
    protocol::{Envelope, InboundMessage, OutboundMessage},
    Result,
};

/// Produces the backend's reply events for one decoded command.
pub type Responder = Box<dyn FnMut(&OutboundMessage) -> Vec<InboundMessage>>;

pub struct LoopbackTransport {
    ready: Cell<bool>,
    live_on_start: bool,
    fail_next_send: RefCell<Option<String>>,
    sent: RefCell<Vec<Envelope>>,
    subscribers: SubscriberList,
    responder: RefCell<Option<Responder>>,
}

impl LoopbackTransport {
    /// Becomes live as soon as `start` returns.
    pub fn new() -> Self {
        Self {
            ready: Cell::new(false),
            live_on_start: true,
            fail_next_send: RefCell::new(None),
            sent: RefCell::new(Vec::new()),
            subscribers: SubscriberList::new(),
            responder: RefCell::new(None),
        }
    }

    /// Stays not-live after `start` until [`Self::go_live`] is called.
    pub fn manual() -> Self {
        Self {
            live_on_start: false,
            ..Self::new()
        }
    }

    pub fn with_responder(responder: Responder) -> Self {
        let transport = Self::new();
        *transport.responder.borrow_mut() = Some(responder);
        transport
    }

    pub fn go_live(&self) {
        log::info!("Loopback backend live");
        self.ready.set(true);
    }

    /// Simulate the backend going away.
    pub fn go_down(&self) {
        self.ready.set(false);
    }

    /// Make the next `send` fail with a delivery error.
    pub fn fail_next_send(&self, reason: impl Into<String>) {
        *self.fail_next_send.borrow_mut() = Some(reason.into());
    }

    /// Push one raw inbound envelope to every subscriber.
    pub fn inject(&self, envelope: Envelope) -> usize {
        self.subscribers.deliver(&envelope)
    }

    pub fn inject_message(&self, message: &InboundMessage) -> Result<usize> {
        Ok(self.inject(message.to_envelope()?))
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.borrow().clone()
    }

    pub fn take_sent(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    /// `type` tags of everything sent so far.
    pub fn sent_types(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|e| e.get("type").and_then(|t| t.as_str()))
            .map(str::to_string)
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn respond(&self, envelope: &Envelope) {
        let replies = {
            let mut responder = self.responder.borrow_mut();
            let Some(responder) = responder.as_mut() else {
                return;
            };
            match OutboundMessage::from_envelope(envelope) {
                Ok(command) => responder(&command),
                Err(e) => {
                    log::warn!("Loopback backend could not decode command: {}", e);
                    return;
                }
            }
        };
        for reply in replies {
            match reply.to_envelope() {
                Ok(env) => {
                    self.subscribers.deliver(&env);
                }
                Err(e) => log::error!("Loopback backend could not encode reply: {}", e),
            }
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl TransportPort for LoopbackTransport {
    async fn start(&self) -> Result<()> {
        if self.live_on_start {
            self.go_live();
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.ready.set(false);
        Ok(())
    }

    async fn send(&self, envelope: Envelope) -> Result<()> {
        if !self.ready.get() {
            return Err(ChatError::NotReady("loopback not live".to_string()));
        }
        if let Some(reason) = self.fail_next_send.borrow_mut().take() {
            return Err(ChatError::Delivery(reason));
        }
        self.sent.borrow_mut().push(envelope.clone());
        self.respond(&envelope);
        Ok(())
    }

    fn subscribe(&self, handler: InboundHandler) -> Subscription {
        self.subscribers.subscribe(handler)
    }

    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn name(&self) -> &str {
        "loopback"
    }
}
