//! Channel readiness state machine and the in-flight command ledger.
//!
//! ```text
//! uninitialized ──start──▶ starting ──live──▶ ready
//!        stopped ──start──▶    │                │
//!           ▲                  └──stop/exit─────┴──▶ stopped
//! ```

use std::collections::VecDeque;
use chat_types::{
    error::ChatError,
    event::ChannelState,
    protocol::{InboundMessage, OutboundMessage},
    Result,
};

pub struct Channel {
    state: ChannelState,
}

impl Channel {
    pub fn new() -> Self {
        Self {
            state: ChannelState::Uninitialized,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ChannelState::Ready
    }

    pub fn begin_start(&mut self) -> Result<()> {
        match self.state {
            ChannelState::Uninitialized | ChannelState::Stopped => {
                self.transition(ChannelState::Starting)
            }
            _ => Err(self.invalid(ChannelState::Starting)),
        }
    }

    pub fn mark_ready(&mut self) -> Result<()> {
        match self.state {
            ChannelState::Starting => self.transition(ChannelState::Ready),
            _ => Err(self.invalid(ChannelState::Ready)),
        }
    }

    pub fn mark_stopped(&mut self) -> Result<()> {
        match self.state {
            ChannelState::Starting | ChannelState::Ready => self.transition(ChannelState::Stopped),
            _ => Err(self.invalid(ChannelState::Stopped)),
        }
    }

    /// Commands are accepted only in `ready`.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ChatError::NotReady(self.state.label().to_string()))
        }
    }

    fn transition(&mut self, to: ChannelState) -> Result<()> {
        log::info!("Channel {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    fn invalid(&self, to: ChannelState) -> ChatError {
        ChatError::InvalidTransition {
            from: self.state.label().to_string(),
            to: to.label().to_string(),
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Command Ledger ──────────────────────────────────────────

/// A command sent and not yet settled by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub message_type: &'static str,
    /// Inbound tags that settle it besides `ack`/`error`
    pub settled_by: &'static [&'static str],
}

/// In-flight commands in send order.
#[derive(Debug, Default)]
pub struct CommandLedger {
    pending: VecDeque<PendingCommand>,
}

impl CommandLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a sent command. Returns false for commands the backend never
    /// answers, which are not tracked.
    pub fn record(&mut self, command: &OutboundMessage) -> bool {
        if !command.expects_reply() {
            return false;
        }
        self.pending.push_back(PendingCommand {
            message_type: command.message_type(),
            settled_by: command.implicit_acks(),
        });
        true
    }

    /// Settle the oldest command this event answers, if any.
    pub fn resolve(&mut self, event: &InboundMessage) -> Option<PendingCommand> {
        let idx = match event {
            InboundMessage::Ack { payload } => self.position_of_type(&payload.original_message_type),
            InboundMessage::Error { payload } => payload
                .original_message_type
                .as_deref()
                .and_then(|t| self.position_of_type(t)),
            other => {
                let tag = other.message_type();
                self.pending.iter().position(|p| p.settled_by.contains(&tag))
            }
        }?;
        self.pending.remove(idx)
    }

    pub fn pending_count(&self, message_type: &str) -> usize {
        self.pending
            .iter()
            .filter(|p| p.message_type == message_type)
            .count()
    }

    pub fn is_pending(&self, message_type: &str) -> bool {
        self.pending_count(message_type) > 0
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn position_of_type(&self, message_type: &str) -> Option<usize> {
        self.pending
            .iter()
            .position(|p| p.message_type == message_type)
    }
}
