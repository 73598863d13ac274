use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::ChatError;

/// Readiness of the backend channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Uninitialized,
    Starting,
    Ready,
    Stopped,
}

impl ChannelState {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelState::Uninitialized => "uninitialized",
            ChannelState::Starting => "starting",
            ChannelState::Ready => "ready",
            ChannelState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Notifications emitted by the client core.
/// The UI drains these to know what to redraw and which errors to surface.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The entry with this id was added or changed
    TranscriptChanged { message_id: String },

    /// An entry was removed
    MessageRemoved { message_id: String },

    /// The transcript was replaced by a bulk load
    ConversationLoaded { chat_id: String },

    /// Transcript, catalog and active conversation were cleared
    ConversationsCleared,

    CatalogChanged,

    HighlightChanged,

    ApiConfigChanged(ApiConfig),

    /// The backend confirmed it stopped generating
    GenerationStopped,

    ChannelStateChanged(ChannelState),

    /// The backend accepted a command
    CommandAcknowledged { message_type: String },

    /// The backend rejected a command, or reported an error without one
    CommandFailed {
        message_type: Option<String>,
        message: String,
    },

    /// A recoverable problem: dropped envelopes, orphan chunks, duplicates
    Warning(ChatError),
}
