pub mod message;
pub mod transcript;
pub mod protocol;
pub mod conversation;
pub mod event;
pub mod config;
pub mod error;


pub use error::{ChatError, ProtocolError};
pub type Result<T> = std::result::Result<T, ChatError>;
