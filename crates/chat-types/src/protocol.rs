//! Wire protocol between the client and the backend process.
//!
//! Both directions are closed tagged unions keyed by the `type` field.
//! Decoding checks the tag against the known vocabulary before touching the
//! payload, so an unknown tag is always reported as such and never coerced
//! into a neighbouring variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ApiConfig;
use crate::conversation::ChatSummary;
use crate::error::ProtocolError;
use crate::message::{Message, MessageChunk, Role};

/// One discrete message unit crossing the channel.
pub type Envelope = Value;

// ─── Payloads ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPromptPayload {
    pub id: String,
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessagePayload {
    pub message_id: String,
    pub new_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageIdPayload {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadChatPayload {
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceDonePayload {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResponsePayload {
    pub id: String,
    pub role: Role,
    /// Always empty in practice; kept for wire compatibility
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub id: String,
    pub response_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ChunkPayload {
    pub fn to_chunk(&self) -> MessageChunk {
        MessageChunk {
            id: self.id.clone(),
            content: self.content.clone(),
            finish_reason: self.finish_reason.clone(),
        }
    }
}

/// A synthesized sentence spanning a set of chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePayload {
    pub id: String,
    pub chunk_ids: Vec<String>,
    pub text: String,
    /// Serialized audio, opaque to the client core
    #[serde(default)]
    pub audio: String,
    pub order: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatListPayload {
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLoadedPayload {
    pub chat_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdatedPayload {
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    pub original_message_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_message_type: Option<String>,
}

// ─── Client → Backend ────────────────────────────────────────

/// Commands and queries sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// The payload travels under `content`
    NewPrompt { content: NewPromptPayload },
    EditMessage { payload: EditMessagePayload },
    DeleteMessage { payload: MessageIdPayload },
    LoadChat { payload: LoadChatPayload },
    CreateNewChat,
    DeleteAllChats,
    SetApiConfig { payload: ApiConfig },
    StopGeneration,
    GetChatList,
    GetApiConfig,
    SentenceDone { payload: SentenceDonePayload },
}

impl OutboundMessage {
    pub const TAGS: [&'static str; 11] = [
        "new-prompt",
        "edit-message",
        "delete-message",
        "load-chat",
        "create-new-chat",
        "delete-all-chats",
        "set-api-config",
        "stop-generation",
        "get-chat-list",
        "get-api-config",
        "sentence-done",
    ];

    pub fn message_type(&self) -> &'static str {
        match self {
            OutboundMessage::NewPrompt { .. } => "new-prompt",
            OutboundMessage::EditMessage { .. } => "edit-message",
            OutboundMessage::DeleteMessage { .. } => "delete-message",
            OutboundMessage::LoadChat { .. } => "load-chat",
            OutboundMessage::CreateNewChat => "create-new-chat",
            OutboundMessage::DeleteAllChats => "delete-all-chats",
            OutboundMessage::SetApiConfig { .. } => "set-api-config",
            OutboundMessage::StopGeneration => "stop-generation",
            OutboundMessage::GetChatList => "get-chat-list",
            OutboundMessage::GetApiConfig => "get-api-config",
            OutboundMessage::SentenceDone { .. } => "sentence-done",
        }
    }

    /// Inbound tags that implicitly acknowledge this command. Commands with
    /// none are settled by `ack` or `error`.
    pub fn implicit_acks(&self) -> &'static [&'static str] {
        match self {
            OutboundMessage::NewPrompt { .. } => &["new-response"],
            OutboundMessage::EditMessage { .. } => &["message-updated"],
            OutboundMessage::DeleteMessage { .. } => &["message-deleted"],
            OutboundMessage::LoadChat { .. } => &["chat-loaded"],
            OutboundMessage::CreateNewChat => &["chat-loaded", "chat-list"],
            OutboundMessage::DeleteAllChats => &["all-chats-deleted"],
            OutboundMessage::SetApiConfig { .. } => &["api-config"],
            OutboundMessage::StopGeneration => &["generation-stopped"],
            OutboundMessage::GetChatList => &["chat-list"],
            OutboundMessage::GetApiConfig => &["api-config"],
            OutboundMessage::SentenceDone { .. } => &[],
        }
    }

    /// Whether the backend answers this command at all. `sentence-done` is
    /// fire-and-forget.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, OutboundMessage::SentenceDone { .. })
    }

    pub fn new_prompt(id: impl Into<String>, content: impl Into<String>) -> Self {
        OutboundMessage::NewPrompt {
            content: NewPromptPayload {
                id: id.into(),
                role: Role::User,
                content: content.into(),
            },
        }
    }

    pub fn new_system_prompt(id: impl Into<String>, content: impl Into<String>) -> Self {
        OutboundMessage::NewPrompt {
            content: NewPromptPayload {
                id: id.into(),
                role: Role::System,
                content: content.into(),
            },
        }
    }

    pub fn edit_message(message_id: impl Into<String>, new_content: impl Into<String>) -> Self {
        OutboundMessage::EditMessage {
            payload: EditMessagePayload {
                message_id: message_id.into(),
                new_content: new_content.into(),
            },
        }
    }

    pub fn delete_message(message_id: impl Into<String>) -> Self {
        OutboundMessage::DeleteMessage {
            payload: MessageIdPayload {
                message_id: message_id.into(),
            },
        }
    }

    pub fn load_chat(chat_id: impl Into<String>) -> Self {
        OutboundMessage::LoadChat {
            payload: LoadChatPayload {
                chat_id: chat_id.into(),
            },
        }
    }

    pub fn set_api_config(config: ApiConfig) -> Self {
        OutboundMessage::SetApiConfig { payload: config }
    }

    pub fn sentence_done(id: impl Into<String>) -> Self {
        OutboundMessage::SentenceDone {
            payload: SentenceDonePayload { id: id.into() },
        }
    }

    pub fn to_envelope(&self) -> crate::Result<Envelope> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a command envelope (the backend side of the channel).
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        let tag = envelope_tag(envelope, &Self::TAGS, &InboundMessage::TAGS)?;
        let message: Self = decode_payload(envelope, tag)?;
        if let OutboundMessage::NewPrompt { content } = &message {
            if content.role == Role::Assistant {
                return Err(malformed(tag, "prompt role must be user or system"));
            }
        }
        Ok(message)
    }
}

// ─── Backend → Client ────────────────────────────────────────

/// Responses and events pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    /// The payload travels under `response`
    NewResponse { response: NewResponsePayload },
    /// Fields sit beside `type`
    Chunk(ChunkPayload),
    Sentence { payload: SentencePayload },
    ChatList { payload: ChatListPayload },
    ChatLoaded { payload: ChatLoadedPayload },
    AllChatsDeleted,
    ApiConfig { payload: ApiConfig },
    MessageDeleted { payload: MessageIdPayload },
    MessageUpdated { payload: MessageUpdatedPayload },
    GenerationStopped,
    Ack { payload: AckPayload },
    Error { payload: ErrorPayload },
}

impl InboundMessage {
    pub const TAGS: [&'static str; 12] = [
        "new-response",
        "chunk",
        "sentence",
        "chat-list",
        "chat-loaded",
        "all-chats-deleted",
        "api-config",
        "message-deleted",
        "message-updated",
        "generation-stopped",
        "ack",
        "error",
    ];

    pub fn message_type(&self) -> &'static str {
        match self {
            InboundMessage::NewResponse { .. } => "new-response",
            InboundMessage::Chunk(_) => "chunk",
            InboundMessage::Sentence { .. } => "sentence",
            InboundMessage::ChatList { .. } => "chat-list",
            InboundMessage::ChatLoaded { .. } => "chat-loaded",
            InboundMessage::AllChatsDeleted => "all-chats-deleted",
            InboundMessage::ApiConfig { .. } => "api-config",
            InboundMessage::MessageDeleted { .. } => "message-deleted",
            InboundMessage::MessageUpdated { .. } => "message-updated",
            InboundMessage::GenerationStopped => "generation-stopped",
            InboundMessage::Ack { .. } => "ack",
            InboundMessage::Error { .. } => "error",
        }
    }

    pub fn new_response(id: impl Into<String>) -> Self {
        InboundMessage::NewResponse {
            response: NewResponsePayload {
                id: id.into(),
                role: Role::Assistant,
                content: String::new(),
            },
        }
    }

    pub fn chunk(
        id: impl Into<String>,
        response_id: impl Into<String>,
        content: impl Into<String>,
        finish_reason: Option<&str>,
    ) -> Self {
        InboundMessage::Chunk(ChunkPayload {
            id: id.into(),
            response_id: response_id.into(),
            content: content.into(),
            finish_reason: finish_reason.map(str::to_string),
        })
    }

    pub fn chat_list(chats: Vec<ChatSummary>) -> Self {
        InboundMessage::ChatList {
            payload: ChatListPayload { chats },
        }
    }

    pub fn chat_loaded(chat_id: impl Into<String>, messages: Vec<Message>) -> Self {
        InboundMessage::ChatLoaded {
            payload: ChatLoadedPayload {
                chat_id: chat_id.into(),
                messages,
            },
        }
    }

    pub fn ack(original_message_type: impl Into<String>, success: bool) -> Self {
        InboundMessage::Ack {
            payload: AckPayload {
                original_message_type: original_message_type.into(),
                success,
                message: None,
            },
        }
    }

    pub fn error(message: impl Into<String>, original_message_type: Option<&str>) -> Self {
        InboundMessage::Error {
            payload: ErrorPayload {
                message: message.into(),
                original_message_type: original_message_type.map(str::to_string),
            },
        }
    }

    // Narrowing accessors

    pub fn as_new_response(&self) -> Option<&NewResponsePayload> {
        match self {
            InboundMessage::NewResponse { response } => Some(response),
            _ => None,
        }
    }

    pub fn as_chunk(&self) -> Option<&ChunkPayload> {
        match self {
            InboundMessage::Chunk(chunk) => Some(chunk),
            _ => None,
        }
    }

    pub fn as_sentence(&self) -> Option<&SentencePayload> {
        match self {
            InboundMessage::Sentence { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn as_chat_list(&self) -> Option<&ChatListPayload> {
        match self {
            InboundMessage::ChatList { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn as_chat_loaded(&self) -> Option<&ChatLoadedPayload> {
        match self {
            InboundMessage::ChatLoaded { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn as_api_config(&self) -> Option<&ApiConfig> {
        match self {
            InboundMessage::ApiConfig { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn as_message_deleted(&self) -> Option<&MessageIdPayload> {
        match self {
            InboundMessage::MessageDeleted { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn as_message_updated(&self) -> Option<&MessageUpdatedPayload> {
        match self {
            InboundMessage::MessageUpdated { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn as_ack(&self) -> Option<&AckPayload> {
        match self {
            InboundMessage::Ack { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorPayload> {
        match self {
            InboundMessage::Error { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn is_all_chats_deleted(&self) -> bool {
        matches!(self, InboundMessage::AllChatsDeleted)
    }

    pub fn is_generation_stopped(&self) -> bool {
        matches!(self, InboundMessage::GenerationStopped)
    }

    pub fn to_envelope(&self) -> crate::Result<Envelope> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode an event envelope.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        let tag = envelope_tag(envelope, &Self::TAGS, &OutboundMessage::TAGS)?;
        let message: Self = decode_payload(envelope, tag)?;
        if let InboundMessage::NewResponse { response } = &message {
            if response.role != Role::Assistant {
                return Err(malformed(tag, "response role must be assistant"));
            }
        }
        Ok(message)
    }

    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        Self::from_envelope(&envelope)
    }
}

/// Extract and vet the `type` tag of an envelope.
fn envelope_tag<'a>(
    envelope: &'a Envelope,
    expected: &[&'static str],
    opposite: &[&'static str],
) -> Result<&'a str, ProtocolError> {
    let object = envelope.as_object().ok_or(ProtocolError::NotAnObject)?;
    let tag = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if expected.contains(&tag) {
        Ok(tag)
    } else if opposite.contains(&tag) {
        Err(ProtocolError::WrongDirection(tag.to_string()))
    } else {
        Err(ProtocolError::UnknownType(tag.to_string()))
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    envelope: &Envelope,
    tag: &str,
) -> Result<T, ProtocolError> {
    T::deserialize(envelope).map_err(|e| malformed(tag, e))
}

fn malformed(tag: &str, reason: impl ToString) -> ProtocolError {
    ProtocolError::Malformed {
        message_type: tag.to_string(),
        reason: reason.to_string(),
    }
}
