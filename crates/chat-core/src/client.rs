//! Chat client. Wires the transport port, channel lifecycle, command
//! ledger and reconciler together.
//!
//! Inbound envelopes are queued by the transport callback and applied when
//! the host calls [`ChatClient::process_pending`], so the callback never
//! touches conversation state. Outbound commands are rejected synchronously
//! unless the channel is ready; nothing is queued for later.

use std::rc::Rc;
use chat_types::{
    config::{ApiConfig, ClientConfig},
    conversation::ChatSummary,
    error::ChatError,
    event::{ChannelState, ClientEvent},
    message::{new_message_id, Message},
    protocol::{Envelope, InboundMessage, OutboundMessage},
    Result,
};
use crate::event_bus::{EventBus, NotificationBus};
use crate::lifecycle::{Channel, CommandLedger};
use crate::ports::{Subscription, TransportPort};
use crate::reconciler::{ConversationState, Reconciler};
use crate::sentence::Acknowledged;

pub struct ChatClient {
    transport: Rc<dyn TransportPort>,
    reconciler: Reconciler,
    channel: Channel,
    ledger: CommandLedger,
    inbox: EventBus<Envelope>,
    subscription: Option<Subscription>,
    bus: NotificationBus,
    config: ClientConfig,
    requested_chat: Option<String>,
}

impl ChatClient {
    pub fn new(transport: Rc<dyn TransportPort>, bus: NotificationBus, config: ClientConfig) -> Self {
        Self {
            reconciler: Reconciler::with_config(bus.clone(), &config),
            transport,
            channel: Channel::new(),
            ledger: CommandLedger::new(),
            inbox: EventBus::new(),
            subscription: None,
            bus,
            config,
            requested_chat: None,
        }
    }

    pub fn state(&self) -> &ConversationState {
        self.reconciler.state()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn ledger(&self) -> &CommandLedger {
        &self.ledger
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The conversation most recently requested via `load_conversation`
    /// whose `chat-loaded` has not arrived yet.
    pub fn requested_conversation(&self) -> Option<&str> {
        self.requested_chat.as_deref()
    }

    pub fn catalog_by_recency(&self) -> Vec<ChatSummary> {
        self.reconciler.catalog_by_recency()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    // ─── Channel lifecycle ───────────────────────────────────

    /// Register for inbound envelopes. Calling it again is a no-op.
    pub fn attach(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let inbox = self.inbox.clone();
        self.subscription = Some(
            self.transport
                .subscribe(Box::new(move |envelope| inbox.emit(envelope))),
        );
        log::debug!("Subscribed to {}", self.transport.name());
    }

    pub fn detach(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
            log::debug!("Unsubscribed from {}", self.transport.name());
        }
    }

    /// Launch the backend. The channel becomes ready right away if the
    /// transport reports live on return, otherwise on [`Self::confirm_ready`].
    pub async fn start(&mut self) -> Result<()> {
        self.channel.begin_start()?;
        self.publish_channel_state();
        self.attach();

        if let Err(e) = self.transport.start().await {
            log::error!("Failed to start {}: {}", self.transport.name(), e);
            self.channel.mark_stopped()?;
            self.publish_channel_state();
            return Err(e);
        }

        if self.transport.is_ready() {
            self.confirm_ready().await?;
        }
        Ok(())
    }

    /// The transport confirmed the backend is live.
    pub async fn confirm_ready(&mut self) -> Result<()> {
        self.channel.mark_ready()?;
        self.publish_channel_state();
        if self.config.refresh_catalog_on_ready {
            self.list_conversations().await?;
        }
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.channel.mark_stopped()?;
        self.ledger.clear();
        self.publish_channel_state();
        self.transport.stop().await
    }

    /// The backend process went away without being asked to.
    pub fn backend_exited(&mut self) {
        if self.channel.mark_stopped().is_ok() {
            log::warn!("Backend behind {} exited", self.transport.name());
            self.ledger.clear();
            self.publish_channel_state();
        }
    }

    // ─── Inbound ─────────────────────────────────────────────

    /// Apply every queued inbound envelope in arrival order.
    /// Returns how many were applied without error.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        for envelope in self.inbox.drain() {
            if self.handle_envelope(&envelope).is_ok() {
                applied += 1;
            }
        }
        applied
    }

    /// Decode and apply one envelope. Protocol violations are dropped with
    /// a warning.
    pub fn handle_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        let message = match InboundMessage::from_envelope(envelope) {
            Ok(m) => m,
            Err(e) => {
                let err = ChatError::Protocol(e);
                log::warn!("Dropping envelope: {}", err);
                self.bus.emit(ClientEvent::Warning(err.clone()));
                return Err(err);
            }
        };
        if let Some(settled) = self.ledger.resolve(&message) {
            log::debug!("`{}` settled by `{}`", settled.message_type, message.message_type());
        }
        if let Some(loaded) = message.as_chat_loaded() {
            if self.requested_chat.as_deref() == Some(loaded.chat_id.as_str()) {
                self.requested_chat = None;
            }
        }
        self.reconciler.apply(message)
    }

    // ─── Commands ────────────────────────────────────────────

    /// Send a user prompt under a freshly generated id. The prompt shows up
    /// in the transcript before the command leaves.
    pub async fn send_prompt(&mut self, content: &str) -> Result<String> {
        let id = new_message_id(&self.config.prompt_id_prefix);
        self.send_prompt_with_id(&id, content).await?;
        Ok(id)
    }

    pub async fn send_prompt_with_id(&mut self, id: &str, content: &str) -> Result<()> {
        self.ensure_ready()?;
        self.reconciler.apply_user_prompt(id, content)?;
        self.dispatch(OutboundMessage::new_prompt(id, content)).await
    }

    pub async fn send_system_prompt(&mut self, id: &str, content: &str) -> Result<()> {
        self.ensure_ready()?;
        self.reconciler.apply_prompt(Message::system(id, content))?;
        self.dispatch(OutboundMessage::new_system_prompt(id, content)).await
    }

    /// The transcript changes only when `message-updated` arrives.
    pub async fn edit_message(&mut self, message_id: &str, new_content: &str) -> Result<()> {
        self.dispatch(OutboundMessage::edit_message(message_id, new_content)).await
    }

    /// The entry is removed only when `message-deleted` arrives.
    pub async fn delete_message(&mut self, message_id: &str) -> Result<()> {
        self.dispatch(OutboundMessage::delete_message(message_id)).await
    }

    pub async fn list_conversations(&mut self) -> Result<()> {
        self.dispatch(OutboundMessage::GetChatList).await
    }

    /// Request a conversation. The transcript is swapped only when the
    /// matching `chat-loaded` arrives.
    pub async fn load_conversation(&mut self, chat_id: &str) -> Result<()> {
        self.dispatch(OutboundMessage::load_chat(chat_id)).await?;
        self.requested_chat = Some(chat_id.to_string());
        Ok(())
    }

    /// The backend announces the new entry by re-sending `chat-list`.
    pub async fn create_conversation(&mut self) -> Result<()> {
        self.dispatch(OutboundMessage::CreateNewChat).await
    }

    /// Local state is cleared only on `all-chats-deleted`.
    pub async fn delete_all_conversations(&mut self) -> Result<()> {
        self.dispatch(OutboundMessage::DeleteAllChats).await
    }

    pub async fn set_api_config(&mut self, config: ApiConfig) -> Result<()> {
        config.validate()?;
        self.dispatch(OutboundMessage::set_api_config(config)).await
    }

    pub async fn get_api_config(&mut self) -> Result<()> {
        self.dispatch(OutboundMessage::GetApiConfig).await
    }

    /// Advisory: streamed content is kept until the backend finishes or
    /// reports `generation-stopped`.
    pub async fn stop_generation(&mut self) -> Result<()> {
        self.dispatch(OutboundMessage::StopGeneration).await
    }

    /// Acknowledge playback of one sentence.
    pub async fn sentence_done(&mut self, sentence_id: &str) -> Result<Acknowledged> {
        self.dispatch(OutboundMessage::sentence_done(sentence_id)).await?;
        Ok(self.reconciler.acknowledge_sentence(sentence_id))
    }

    fn ensure_ready(&self) -> Result<()> {
        self.channel.ensure_ready()?;
        if !self.transport.is_ready() {
            return Err(ChatError::NotReady(format!(
                "{} not live",
                self.transport.name()
            )));
        }
        Ok(())
    }

    async fn dispatch(&mut self, command: OutboundMessage) -> Result<()> {
        if let Err(e) = self.ensure_ready() {
            log::warn!("Rejected `{}`: {}", command.message_type(), e);
            return Err(e);
        }
        let envelope = command.to_envelope()?;
        self.transport.send(envelope).await?;
        if self.ledger.record(&command) {
            log::debug!("Sent `{}`", command.message_type());
        } else {
            log::trace!("Sent `{}` (untracked)", command.message_type());
        }
        Ok(())
    }

    fn publish_channel_state(&self) {
        self.bus
            .emit(ClientEvent::ChannelStateChanged(self.channel.state()));
    }
}
