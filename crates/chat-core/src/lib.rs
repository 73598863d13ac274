//! Client core for the chat protocol: reconciler, playback sync, channel
//! lifecycle, and the transport port.

pub mod event_bus;
pub mod ports;
pub mod reconciler;
pub mod sentence;
pub mod lifecycle;
pub mod client;


pub use client::ChatClient;
pub use event_bus::{EventBus, NotificationBus};
pub use reconciler::{ConversationState, Reconciler};
