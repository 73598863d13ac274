//! Port traits at the boundary between the core and the platform.
//!
//! The transport that marshals envelopes between the client and the backend
//! process is defined here as a trait. Implementations live in
//! `chat-platform`; the core only depends on this contract.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use async_trait::async_trait;
use chat_types::{protocol::Envelope, Result};

/// Callback invoked once per inbound envelope, in arrival order.
pub type InboundHandler = Box<dyn FnMut(Envelope)>;

// ─── Transport Port ──────────────────────────────────────────

#[async_trait(?Send)]
pub trait TransportPort {
    /// Launch (or connect to) the backend process.
    async fn start(&self) -> Result<()>;

    /// Shut the backend down. Idempotent.
    async fn stop(&self) -> Result<()>;

    /// Deliver one envelope to the backend.
    ///
    /// Fails with `ChatError::NotReady` while the backend is not live and
    /// with `ChatError::Delivery` on transport failure. No retries.
    async fn send(&self, envelope: Envelope) -> Result<()>;

    /// Register a handler for inbound envelopes.
    fn subscribe(&self, handler: InboundHandler) -> Subscription;

    /// Synchronous readiness check
    fn is_ready(&self) -> bool;

    /// Name of this transport (for logging/debug)
    fn name(&self) -> &str;
}

// ─── Subscription ────────────────────────────────────────────

/// Deregistration handle returned by [`TransportPort::subscribe`].
///
/// `unsubscribe` may be called any number of times; only the first call has
/// an effect. Dropping the handle does not unsubscribe.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle that was never attached to anything.
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ─── Subscriber List ─────────────────────────────────────────

/// Handler registry shared by transport adapters.
///
/// Handlers may unsubscribe (or subscribe others) from inside a delivery
/// callback; such changes take effect from the next envelope.
#[derive(Clone, Default)]
pub struct SubscriberList {
    inner: Rc<RefCell<Slots>>,
}

#[derive(Default)]
struct Slots {
    next_id: u64,
    handlers: Vec<(u64, InboundHandler)>,
    delivering: bool,
    removed_during_delivery: Vec<u64>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: InboundHandler) -> Subscription {
        let id = {
            let mut slots = self.inner.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.handlers.push((id, handler));
            id
        };
        let weak: Weak<RefCell<Slots>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut slots = inner.borrow_mut();
                slots.handlers.retain(|(h, _)| *h != id);
                if slots.delivering {
                    slots.removed_during_delivery.push(id);
                }
            }
        })
    }

    /// Hand one envelope to every registered handler, in registration order.
    /// Returns the number of handlers invoked.
    pub fn deliver(&self, envelope: &Envelope) -> usize {
        let mut active = {
            let mut slots = self.inner.borrow_mut();
            slots.delivering = true;
            std::mem::take(&mut slots.handlers)
        };

        let invoked = active.len();
        for (_, handler) in active.iter_mut() {
            handler(envelope.clone());
        }

        let mut slots = self.inner.borrow_mut();
        let removed = std::mem::take(&mut slots.removed_during_delivery);
        active.retain(|(id, _)| !removed.contains(id));
        // Handlers registered during delivery were pushed into the now-empty slot list
        active.append(&mut slots.handlers);
        slots.handlers = active;
        slots.delivering = false;
        invoked
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
