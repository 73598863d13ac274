//! Conversation reconciler.
//!
//! Folds inbound protocol events, plus locally originated prompts, into the
//! transcript of the active conversation. Invariants kept here:
//! - at most one placeholder per response id (`new-response` is idempotent)
//! - chunks are appended in arrival order, never reordered or synthesized
//! - completion of a chunked message never reverts
//! - no two transcript entries share an id
//!
//! Recoverable problems are logged, published as `ClientEvent::Warning`,
//! and returned to the caller. None of them stops the reconciler.

use chat_types::{
    config::{ApiConfig, ClientConfig},
    conversation::{sort_by_recency, ChatSummary},
    error::ChatError,
    event::ClientEvent,
    message::{Message, MessageChunk, Role},
    protocol::{AckPayload, ErrorPayload, InboundMessage, SentencePayload},
    transcript::{PlaceholderOutcome, Transcript},
    Result,
};
use crate::event_bus::NotificationBus;
use crate::sentence::{Acknowledged, Playback, SentenceHighlight};

/// Everything the UI renders for the active conversation.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub active_conversation_id: Option<String>,
    pub transcript: Transcript,
    pub catalog: Vec<ChatSummary>,
    pub playback: Playback,
    /// Latest configuration reported by the backend
    pub api_config: Option<ApiConfig>,
}

impl ConversationState {
    pub fn new(clear_highlight_on_done: bool) -> Self {
        Self {
            active_conversation_id: None,
            transcript: Transcript::new(),
            catalog: Vec::new(),
            playback: Playback::new(clear_highlight_on_done),
            api_config: None,
        }
    }

    pub fn sentence_highlight(&self) -> Option<&SentenceHighlight> {
        self.playback.highlight()
    }
}

pub struct Reconciler {
    state: ConversationState,
    bus: NotificationBus,
}

impl Reconciler {
    pub fn new(bus: NotificationBus) -> Self {
        Self::with_config(bus, &ClientConfig::default())
    }

    pub fn with_config(bus: NotificationBus, config: &ClientConfig) -> Self {
        Self {
            state: ConversationState::new(config.clear_highlight_on_sentence_done),
            bus,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.state.transcript
    }

    pub fn catalog(&self) -> &[ChatSummary] {
        &self.state.catalog
    }

    pub fn catalog_by_recency(&self) -> Vec<ChatSummary> {
        sort_by_recency(&self.state.catalog)
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.state.active_conversation_id.as_deref()
    }

    /// True while any streamed response is still open.
    pub fn is_generating(&self) -> bool {
        self.state.transcript.has_incomplete()
    }

    /// Apply one decoded inbound event.
    pub fn apply(&mut self, message: InboundMessage) -> Result<()> {
        log::debug!("Applying `{}`", message.message_type());
        match message {
            InboundMessage::NewResponse { response } => {
                self.apply_new_response(&response.id).map(|_| ())
            }
            InboundMessage::Chunk(chunk) => {
                let response_id = chunk.response_id.clone();
                self.apply_chunk(&response_id, chunk.to_chunk())
            }
            InboundMessage::Sentence { payload } => self.apply_sentence(payload),
            InboundMessage::ChatList { payload } => {
                self.replace_catalog(payload.chats);
                Ok(())
            }
            InboundMessage::ChatLoaded { payload } => {
                self.replace_transcript(payload.chat_id, payload.messages);
                Ok(())
            }
            InboundMessage::AllChatsDeleted => {
                self.clear_all();
                Ok(())
            }
            InboundMessage::ApiConfig { payload } => {
                self.set_api_config(payload);
                Ok(())
            }
            InboundMessage::MessageDeleted { payload } => {
                self.apply_message_deleted(&payload.message_id)
            }
            InboundMessage::MessageUpdated { payload } => {
                self.apply_message_updated(payload.message)
            }
            InboundMessage::GenerationStopped => {
                // Partially streamed content stays as is
                log::info!("Backend stopped generation");
                self.bus.emit(ClientEvent::GenerationStopped);
                Ok(())
            }
            InboundMessage::Ack { payload } => {
                self.apply_ack(payload);
                Ok(())
            }
            InboundMessage::Error { payload } => {
                self.apply_backend_error(payload);
                Ok(())
            }
        }
    }

    /// Open a placeholder for a streamed response. A repeat delivery for
    /// the same id is a no-op.
    pub fn apply_new_response(&mut self, id: &str) -> Result<PlaceholderOutcome> {
        match self.state.transcript.open_placeholder(id, Role::Assistant) {
            Ok(PlaceholderOutcome::Created) => {
                log::debug!("Opened placeholder {}", id);
                self.changed(id);
                Ok(PlaceholderOutcome::Created)
            }
            Ok(PlaceholderOutcome::AlreadyOpen) => {
                log::debug!("Duplicate new-response {} ignored", id);
                Ok(PlaceholderOutcome::AlreadyOpen)
            }
            Err(e) => Err(self.warn(e)),
        }
    }

    /// Append a chunk to the response it names. A chunk for an unknown
    /// response is dropped, never turned into a new entry.
    pub fn apply_chunk(&mut self, response_id: &str, chunk: MessageChunk) -> Result<()> {
        let Some(message) = self.state.transcript.chunked_mut(response_id) else {
            return Err(self.warn(ChatError::OrphanChunk {
                response_id: response_id.to_string(),
                chunk_id: chunk.id,
            }));
        };

        let chunk_id = chunk.id.clone();
        let was_complete = message.is_complete();
        if !message.push_chunk(chunk) {
            log::debug!("Redelivered chunk {} for {} dropped", chunk_id, response_id);
            return Ok(());
        }
        if !was_complete && message.is_complete() {
            log::debug!("Response {} complete", response_id);
        }
        self.changed(response_id);
        Ok(())
    }

    /// Record a user prompt before it is sent. The id must be the one used
    /// in the outbound `new-prompt`.
    pub fn apply_user_prompt(&mut self, id: &str, content: &str) -> Result<()> {
        self.apply_prompt(Message::user(id, content))
    }

    pub fn apply_prompt(&mut self, message: Message) -> Result<()> {
        let id = message.id.clone();
        match self.state.transcript.push_complete(message) {
            Ok(()) => {
                self.changed(&id);
                Ok(())
            }
            Err(e) => Err(self.warn(e)),
        }
    }

    /// Swap in a bulk-loaded conversation. Streaming state and playback of
    /// the previous conversation are discarded.
    pub fn replace_transcript(&mut self, chat_id: String, messages: Vec<Message>) {
        let (transcript, discarded) = Transcript::from_messages(messages);
        for id in discarded {
            self.warn(ChatError::DuplicateMessage(id));
        }
        log::info!(
            "Loaded conversation {} ({} messages)",
            chat_id,
            transcript.len()
        );
        self.state.transcript = transcript;
        self.state.playback.reset();
        self.state.active_conversation_id = Some(chat_id.clone());
        self.bus.emit(ClientEvent::ConversationLoaded { chat_id });
        self.bus.emit(ClientEvent::HighlightChanged);
    }

    /// Forget every conversation.
    pub fn clear_all(&mut self) {
        log::info!("All conversations deleted");
        self.state.transcript.clear();
        self.state.catalog.clear();
        self.state.playback.reset();
        self.state.active_conversation_id = None;
        self.bus.emit(ClientEvent::ConversationsCleared);
    }

    /// The backend is authoritative for the catalog: full replace.
    pub fn replace_catalog(&mut self, chats: Vec<ChatSummary>) {
        log::debug!("Catalog replaced ({} entries)", chats.len());
        self.state.catalog = chats;
        self.bus.emit(ClientEvent::CatalogChanged);
    }

    pub fn set_api_config(&mut self, config: ApiConfig) {
        self.state.api_config = Some(config.clone());
        self.bus.emit(ClientEvent::ApiConfigChanged(config));
    }

    pub fn apply_message_deleted(&mut self, message_id: &str) -> Result<()> {
        if self.state.transcript.remove(message_id).is_none() {
            return Err(self.warn(ChatError::UnknownMessage(message_id.to_string())));
        }
        if self.state.playback.forget_message(message_id) {
            self.bus.emit(ClientEvent::HighlightChanged);
        }
        self.bus.emit(ClientEvent::MessageRemoved {
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    /// Replace a complete message wholesale. Chunked entries are never
    /// converted.
    pub fn apply_message_updated(&mut self, message: Message) -> Result<()> {
        let id = message.id.clone();
        if !self.state.transcript.replace_complete(message) {
            return Err(self.warn(ChatError::UnknownMessage(id)));
        }
        self.changed(&id);
        Ok(())
    }

    pub fn apply_sentence(&mut self, sentence: SentencePayload) -> Result<()> {
        match self
            .state
            .playback
            .on_sentence(&self.state.transcript, sentence)
        {
            Ok(_) => {
                self.bus.emit(ClientEvent::HighlightChanged);
                Ok(())
            }
            Err(e) => Err(self.warn(e)),
        }
    }

    /// Local bookkeeping once a sentence finished playing.
    pub fn acknowledge_sentence(&mut self, sentence_id: &str) -> Acknowledged {
        let ack = self.state.playback.acknowledge(sentence_id);
        if ack.highlight_cleared {
            self.bus.emit(ClientEvent::HighlightChanged);
        }
        ack
    }

    fn apply_ack(&mut self, ack: AckPayload) {
        if ack.success {
            log::debug!("Backend acknowledged `{}`", ack.original_message_type);
            self.bus.emit(ClientEvent::CommandAcknowledged {
                message_type: ack.original_message_type,
            });
        } else {
            let message = ack
                .message
                .unwrap_or_else(|| "command rejected".to_string());
            log::warn!("Backend rejected `{}`: {}", ack.original_message_type, message);
            self.bus.emit(ClientEvent::CommandFailed {
                message_type: Some(ack.original_message_type),
                message,
            });
        }
    }

    fn apply_backend_error(&mut self, error: ErrorPayload) {
        match &error.original_message_type {
            Some(t) => log::error!("Backend error for `{}`: {}", t, error.message),
            None => log::error!("Backend error: {}", error.message),
        }
        self.bus.emit(ClientEvent::CommandFailed {
            message_type: error.original_message_type,
            message: error.message,
        });
    }

    fn changed(&self, message_id: &str) {
        self.bus.emit(ClientEvent::TranscriptChanged {
            message_id: message_id.to_string(),
        });
    }

    /// Log and publish a recoverable problem, handing it back for `Err`.
    fn warn(&self, err: ChatError) -> ChatError {
        log::warn!("{}", err);
        self.bus.emit(ClientEvent::Warning(err.clone()));
        err
    }
}
