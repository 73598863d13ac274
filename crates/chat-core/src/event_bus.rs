//! Simple event bus for decoupled communication between the client core and UI.
//!
//! The bus is single-threaded and uses interior mutability via RefCell.
//! Events are buffered and drained by the consumer on each frame. The same
//! queue doubles as the inbound envelope inbox filled by transport callbacks.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use chat_types::event::ClientEvent;

/// Shared FIFO queue, clone-cheap via Rc.
pub struct EventBus<T> {
    inner: Rc<RefCell<VecDeque<T>>>,
}

/// Notifications from the core to the UI layer.
pub type NotificationBus = EventBus<ClientEvent>;

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Publish an event.
    pub fn emit(&self, event: T) {
        self.inner.borrow_mut().push_back(event);
    }

    /// Drain all pending events in publication order.
    pub fn drain(&self) -> Vec<T> {
        self.inner.borrow_mut().drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
