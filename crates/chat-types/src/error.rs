use thiserror::Error;

/// An inbound (or outbound) envelope that cannot be interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Envelope is not a JSON object")]
    NotAnObject,

    #[error("Envelope is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Envelope has no string `type` field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Message type `{0}` is not valid in this direction")]
    WrongDirection(String),

    #[error("Malformed `{message_type}` payload: {reason}")]
    Malformed { message_type: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Chunk {chunk_id} references unknown response {response_id}")]
    OrphanChunk { response_id: String, chunk_id: String },

    #[error("Duplicate message id: {0}")]
    DuplicateMessage(String),

    #[error("No transcript entry with id {0}")]
    UnknownMessage(String),

    #[error("Sentence {0} matches no streamed response")]
    UnownedSentence(String),

    #[error("Channel not ready (state: {0})")]
    NotReady(String),

    #[error("Backend error: {message}")]
    Backend {
        message: String,
        original_message_type: Option<String>,
    },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid channel transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}
