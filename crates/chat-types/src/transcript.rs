//! Ordered, id-unique sequence of transcript entries.
//!
//! Insertion order is display order. Every insertion path checks the id
//! against all existing entries of either variant.

use serde::Serialize;

use crate::error::ChatError;
use crate::message::{ChunkedMessage, Message, Role, TranscriptMessage};
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptMessage>,
}

/// Outcome of opening a streamed-response placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderOutcome {
    Created,
    AlreadyOpen,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transcript from a bulk load, keeping the first entry of any
    /// repeated id. Returns the transcript and the ids that were discarded.
    pub fn from_messages(messages: Vec<Message>) -> (Self, Vec<String>) {
        let mut transcript = Self::new();
        let mut discarded = Vec::new();
        for message in messages {
            let id = message.id.clone();
            if transcript.push_complete(message).is_err() {
                discarded.push(id);
            }
        }
        (transcript, discarded)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscriptMessage> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[TranscriptMessage] {
        &self.entries
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&TranscriptMessage> {
        self.entries.iter().find(|m| m.id() == id)
    }

    pub fn chunked(&self, id: &str) -> Option<&ChunkedMessage> {
        self.get(id).and_then(TranscriptMessage::as_chunked)
    }

    pub fn chunked_mut(&mut self, id: &str) -> Option<&mut ChunkedMessage> {
        self.entries.iter_mut().find_map(|m| match m {
            TranscriptMessage::Chunked(c) if c.id() == id => Some(c),
            _ => None,
        })
    }

    /// Append a complete message. Rejects a duplicate id.
    pub fn push_complete(&mut self, message: Message) -> Result<()> {
        if self.contains(&message.id) {
            return Err(ChatError::DuplicateMessage(message.id));
        }
        self.entries.push(TranscriptMessage::Complete(message));
        Ok(())
    }

    /// Append an empty chunked placeholder, unless one with this id exists.
    ///
    /// A complete message holding the id is a duplicate, not an open
    /// placeholder.
    pub fn open_placeholder(&mut self, id: &str, role: Role) -> Result<PlaceholderOutcome> {
        match self.get(id) {
            Some(TranscriptMessage::Chunked(_)) => Ok(PlaceholderOutcome::AlreadyOpen),
            Some(TranscriptMessage::Complete(_)) => Err(ChatError::DuplicateMessage(id.to_string())),
            None => {
                self.entries
                    .push(TranscriptMessage::Chunked(ChunkedMessage::placeholder(id, role)));
                Ok(PlaceholderOutcome::Created)
            }
        }
    }

    /// Replace a complete message wholesale, keeping its position.
    ///
    /// Returns `false` if no complete message holds this id.
    pub fn replace_complete(&mut self, message: Message) -> bool {
        match self.position(&message.id) {
            Some(idx) if matches!(self.entries[idx], TranscriptMessage::Complete(_)) => {
                self.entries[idx] = TranscriptMessage::Complete(message);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<TranscriptMessage> {
        self.position(id).map(|idx| self.entries.remove(idx))
    }

    /// The chunked message owning any of the given chunk ids. First match in
    /// transcript order wins.
    pub fn owner_of_chunks(&self, chunk_ids: &[String]) -> Option<&ChunkedMessage> {
        self.entries.iter().find_map(|m| match m {
            TranscriptMessage::Chunked(c) if chunk_ids.iter().any(|id| c.contains_chunk(id)) => {
                Some(c)
            }
            _ => None,
        })
    }

    /// True while any streamed response is still open.
    pub fn has_incomplete(&self) -> bool {
        self.entries
            .iter()
            .any(|m| matches!(m, TranscriptMessage::Chunked(c) if !c.is_complete()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|m| m.id() == id)
    }
}
