use serde::{Deserialize, Serialize};

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A fully formed transcript entry. Immutable once created.
///
/// This is also the wire shape used by `chat-loaded` and `message-updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content)
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, content)
    }

    pub fn system(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::System, content)
    }
}

/// One streamed fragment of an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageChunk {
    pub id: String,
    pub content: String,
    /// Non-null on the terminal chunk of its response
    #[serde(rename = "finishReason", default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl MessageChunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            finish_reason: None,
        }
    }

    pub fn terminal(
        id: impl Into<String>,
        content: impl Into<String>,
        finish_reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            finish_reason: Some(finish_reason.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// A transcript entry assembled from streamed chunks.
///
/// Fields are private so the only mutation is [`ChunkedMessage::push_chunk`],
/// which keeps `is_complete` monotonic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedMessage {
    id: String,
    role: Role,
    contents: Vec<MessageChunk>,
    is_complete: bool,
}

impl ChunkedMessage {
    /// An empty placeholder awaiting chunks.
    pub fn placeholder(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            contents: Vec::new(),
            is_complete: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn contents(&self) -> &[MessageChunk] {
        &self.contents
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn contains_chunk(&self, chunk_id: &str) -> bool {
        self.contents.iter().any(|c| c.id == chunk_id)
    }

    /// Append a chunk in arrival order.
    ///
    /// Returns `false` when a chunk with the same non-empty id is already
    /// present (redelivery); the message is left untouched in that case.
    pub fn push_chunk(&mut self, chunk: MessageChunk) -> bool {
        if !chunk.id.is_empty() && self.contains_chunk(&chunk.id) {
            return false;
        }
        if chunk.is_terminal() {
            self.is_complete = true;
        }
        self.contents.push(chunk);
        true
    }

    /// Concatenated text of all chunks received so far.
    pub fn text(&self) -> String {
        self.contents.iter().map(|c| c.content.as_str()).collect()
    }
}

/// An entry of the conversation transcript. The two variants are never
/// converted into each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TranscriptMessage {
    Complete(Message),
    Chunked(ChunkedMessage),
}

impl TranscriptMessage {
    pub fn id(&self) -> &str {
        match self {
            TranscriptMessage::Complete(m) => &m.id,
            TranscriptMessage::Chunked(m) => m.id(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            TranscriptMessage::Complete(m) => m.role,
            TranscriptMessage::Chunked(m) => m.role(),
        }
    }

    /// Display text: the full content, or the chunks assembled so far.
    pub fn text(&self) -> String {
        match self {
            TranscriptMessage::Complete(m) => m.content.clone(),
            TranscriptMessage::Chunked(m) => m.text(),
        }
    }

    pub fn as_complete(&self) -> Option<&Message> {
        match self {
            TranscriptMessage::Complete(m) => Some(m),
            TranscriptMessage::Chunked(_) => None,
        }
    }

    pub fn as_chunked(&self) -> Option<&ChunkedMessage> {
        match self {
            TranscriptMessage::Chunked(m) => Some(m),
            TranscriptMessage::Complete(_) => None,
        }
    }
}

/// A fresh id for a locally originated message, e.g. `user-3f2a…`.
pub fn new_message_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}
