//! Transport adapters implementing `chat_core::ports::TransportPort`.

pub mod backend;
pub mod channel;
pub mod loopback;

#[cfg(test)]
mod tests;

pub use backend::ScriptedBackend;
pub use channel::{channel_pair, BackendEnd, ChannelTransport};
pub use loopback::{LoopbackTransport, Responder};
