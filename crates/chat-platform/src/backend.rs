//! In-memory stand-in for the backend process.
//!
//! Keeps conversations in memory and answers every command the way the
//! real backend does over the wire: prompts stream back as a
//! `new-response` followed by word-sized chunks, catalog changes are
//! announced with `chat-list`, and failures come back as `error` keyed by
//! the command type. Plug it into [`crate::LoopbackTransport`] through
//! [`ScriptedBackend::into_responder`] or [`ScriptedBackend::shared`].

use std::cell::RefCell;
use std::rc::Rc;
use chat_types::{
    config::ApiConfig,
    conversation::ChatSummary,
    message::{Message, Role},
    protocol::{InboundMessage, MessageIdPayload, MessageUpdatedPayload, OutboundMessage, SentencePayload},
};
use crate::loopback::Responder;

struct StoredChat {
    summary: ChatSummary,
    messages: Vec<Message>,
}

pub struct ScriptedBackend {
    chats: Vec<StoredChat>,
    active: Option<String>,
    config: ApiConfig,
    next_id: u64,
    speak: bool,
    reply: Box<dyn Fn(&str) -> String>,
}

impl ScriptedBackend {
    /// Replies echo the prompt.
    pub fn new() -> Self {
        Self {
            chats: Vec::new(),
            active: None,
            config: ApiConfig::backend_defaults(),
            next_id: 1,
            speak: false,
            reply: Box::new(|prompt| format!("echo: {}", prompt)),
        }
    }

    pub fn with_reply(mut self, reply: impl Fn(&str) -> String + 'static) -> Self {
        self.reply = Box::new(reply);
        self
    }

    /// Also emit a `sentence` event per spoken sentence of each reply.
    pub fn with_speech(mut self) -> Self {
        self.speak = true;
        self
    }

    /// Seed a stored conversation.
    pub fn with_chat(mut self, id: &str, title: &str, messages: Vec<Message>) -> Self {
        self.chats.push(StoredChat {
            summary: ChatSummary::new(id, title, now()),
            messages,
        });
        self
    }

    pub fn into_responder(mut self) -> Responder {
        Box::new(move |command| self.handle(command))
    }

    /// A responder that leaves the backend inspectable by the caller.
    pub fn shared(backend: &Rc<RefCell<Self>>) -> Responder {
        let backend = backend.clone();
        Box::new(move |command| backend.borrow_mut().handle(command))
    }

    pub fn active_chat(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Messages stored for a conversation.
    pub fn messages(&self, chat_id: &str) -> Option<&[Message]> {
        self.chats
            .iter()
            .find(|c| c.summary.id == chat_id)
            .map(|c| c.messages.as_slice())
    }

    /// Events the backend emits in answer to one command.
    pub fn handle(&mut self, command: &OutboundMessage) -> Vec<InboundMessage> {
        log::debug!("Scripted backend handling `{}`", command.message_type());
        match command {
            OutboundMessage::NewPrompt { content } => {
                let prompt = Message::new(content.id.clone(), content.role, content.content.clone());
                self.prompt(prompt)
            }
            OutboundMessage::EditMessage { payload } => {
                let edited = self.active_messages().and_then(|messages| {
                    let message = messages
                        .iter_mut()
                        .find(|m| m.id == payload.message_id)?;
                    message.content = payload.new_content.clone();
                    Some(message.clone())
                });
                match edited {
                    Some(message) => vec![InboundMessage::MessageUpdated {
                        payload: MessageUpdatedPayload { message },
                    }],
                    None => vec![not_found("message", &payload.message_id, command)],
                }
            }
            OutboundMessage::DeleteMessage { payload } => {
                let removed = self.active_messages().is_some_and(|messages| {
                    let before = messages.len();
                    messages.retain(|m| m.id != payload.message_id);
                    messages.len() < before
                });
                if removed {
                    vec![InboundMessage::MessageDeleted {
                        payload: MessageIdPayload {
                            message_id: payload.message_id.clone(),
                        },
                    }]
                } else {
                    vec![not_found("message", &payload.message_id, command)]
                }
            }
            OutboundMessage::LoadChat { payload } => {
                match self.messages(&payload.chat_id).map(<[Message]>::to_vec) {
                    Some(messages) => {
                        self.active = Some(payload.chat_id.clone());
                        vec![InboundMessage::chat_loaded(payload.chat_id.clone(), messages)]
                    }
                    None => vec![not_found("chat", &payload.chat_id, command)],
                }
            }
            OutboundMessage::CreateNewChat => {
                let id = self.create_chat();
                self.active = Some(id);
                vec![self.chat_list()]
            }
            OutboundMessage::DeleteAllChats => {
                self.chats.clear();
                self.active = None;
                vec![InboundMessage::AllChatsDeleted]
            }
            OutboundMessage::SetApiConfig { payload } => {
                self.config.merge(payload);
                vec![InboundMessage::ApiConfig {
                    payload: self.config.clone(),
                }]
            }
            OutboundMessage::StopGeneration => vec![InboundMessage::GenerationStopped],
            OutboundMessage::GetChatList => vec![self.chat_list()],
            OutboundMessage::GetApiConfig => vec![InboundMessage::ApiConfig {
                payload: self.config.clone(),
            }],
            OutboundMessage::SentenceDone { .. } => Vec::new(),
        }
    }

    fn prompt(&mut self, prompt: Message) -> Vec<InboundMessage> {
        if self.active.is_none() {
            let id = self.create_chat();
            self.active = Some(id);
        }
        let reply_text = (self.reply)(&prompt.content);
        let response_id = self.fresh_id("resp");

        let mut events = vec![InboundMessage::new_response(response_id.clone())];
        let words: Vec<&str> = reply_text.split_inclusive(' ').collect();
        let mut spoken = Vec::with_capacity(words.len());
        if words.is_empty() {
            let chunk_id = format!("{}-c0", response_id);
            events.push(InboundMessage::chunk(chunk_id.clone(), response_id.clone(), "", Some("stop")));
            spoken.push((chunk_id, String::new()));
        }
        for (i, word) in words.iter().enumerate() {
            let chunk_id = format!("{}-c{}", response_id, i);
            let finish = (i + 1 == words.len()).then_some("stop");
            events.push(InboundMessage::chunk(chunk_id.clone(), response_id.clone(), *word, finish));
            spoken.push((chunk_id, word.to_string()));
        }
        if self.speak {
            events.extend(sentences(&response_id, &spoken));
        }

        if let Some(messages) = self.active_messages() {
            messages.push(prompt);
            messages.push(Message::new(response_id, Role::Assistant, reply_text));
        }
        if let Some(chat) = self.active_chat_mut() {
            chat.summary.last_updated = now();
        }
        events
    }

    fn create_chat(&mut self) -> String {
        let id = self.fresh_id("chat");
        self.chats.push(StoredChat {
            summary: ChatSummary::new(id.clone(), "New chat", now()),
            messages: Vec::new(),
        });
        id
    }

    fn chat_list(&self) -> InboundMessage {
        InboundMessage::chat_list(self.chats.iter().map(|c| c.summary.clone()).collect())
    }

    fn active_chat_mut(&mut self) -> Option<&mut StoredChat> {
        let active = self.active.as_deref()?;
        self.chats.iter_mut().find(|c| c.summary.id == active)
    }

    fn active_messages(&mut self) -> Option<&mut Vec<Message>> {
        self.active_chat_mut().map(|c| &mut c.messages)
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Group chunks into sentences ending in `.`, `!` or `?` (or the last chunk).
fn sentences(response_id: &str, chunks: &[(String, String)]) -> Vec<InboundMessage> {
    let mut out = Vec::new();
    let mut ids = Vec::new();
    let mut text = String::new();
    for (i, (id, content)) in chunks.iter().enumerate() {
        ids.push(id.clone());
        text.push_str(content);
        let ends = content.trim_end().ends_with(['.', '!', '?']);
        if ends || i + 1 == chunks.len() {
            let order = out.len() as u64;
            out.push(InboundMessage::Sentence {
                payload: SentencePayload {
                    id: format!("{}-s{}", response_id, order),
                    chunk_ids: std::mem::take(&mut ids),
                    text: std::mem::take(&mut text).trim().to_string(),
                    audio: String::new(),
                    order,
                },
            });
        }
    }
    out
}

fn not_found(what: &str, id: &str, command: &OutboundMessage) -> InboundMessage {
    InboundMessage::error(format!("{} {} not found", what, id), Some(command.message_type()))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
