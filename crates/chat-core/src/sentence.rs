//! Sentence/playback synchronizer.
//!
//! Maps synthesized-sentence events onto the chunks of the streamed reply
//! they were spoken from, so a renderer can highlight the sentence being
//! played. The highlight is advisory display state: it never affects the
//! transcript and is overwritten by the next sentence.

use chat_types::{
    error::ChatError,
    protocol::SentencePayload,
    transcript::Transcript,
    Result,
};

/// The transcript sub-range currently being spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceHighlight {
    pub sentence_id: String,
    pub message_id: String,
    pub chunk_ids: Vec<String>,
}

/// A sentence awaiting playback acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceCue {
    pub id: String,
    pub message_id: String,
    pub chunk_ids: Vec<String>,
    pub text: String,
    pub audio: String,
    pub order: u64,
}

/// Result of acknowledging a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Acknowledged {
    pub cue: Option<SentenceCue>,
    pub highlight_cleared: bool,
}

#[derive(Debug, Clone)]
pub struct Playback {
    highlight: Option<SentenceHighlight>,
    cues: Vec<SentenceCue>,
    /// Message ids in the order their first sentence arrived
    message_order: Vec<String>,
    clear_on_done: bool,
}

impl Playback {
    pub fn new(clear_on_done: bool) -> Self {
        Self {
            highlight: None,
            cues: Vec::new(),
            message_order: Vec::new(),
            clear_on_done,
        }
    }

    pub fn highlight(&self) -> Option<&SentenceHighlight> {
        self.highlight.as_ref()
    }

    /// Pending cues, ordered by owning message then by sentence order.
    pub fn cues(&self) -> &[SentenceCue] {
        &self.cues
    }

    /// The cue an audio player should play next.
    pub fn next_cue(&self) -> Option<&SentenceCue> {
        self.cues.first()
    }

    /// Attribute a sentence to the chunked message owning any of its chunk
    /// ids and move the highlight onto it.
    pub fn on_sentence(
        &mut self,
        transcript: &Transcript,
        sentence: SentencePayload,
    ) -> Result<&SentenceHighlight> {
        let owner = transcript
            .owner_of_chunks(&sentence.chunk_ids)
            .ok_or_else(|| ChatError::UnownedSentence(sentence.id.clone()))?;
        let message_id = owner.id().to_string();

        if !self.message_order.contains(&message_id) {
            self.message_order.push(message_id.clone());
        }
        self.cues.retain(|c| c.id != sentence.id);
        self.cues.push(SentenceCue {
            id: sentence.id.clone(),
            message_id: message_id.clone(),
            chunk_ids: sentence.chunk_ids.clone(),
            text: sentence.text,
            audio: sentence.audio,
            order: sentence.order,
        });
        let message_order = &self.message_order;
        self.cues.sort_by_key(|c| {
            let rank = message_order
                .iter()
                .position(|m| *m == c.message_id)
                .unwrap_or(usize::MAX);
            (rank, c.order)
        });

        log::debug!(
            "Sentence {} highlights {} chunk(s) of {}",
            sentence.id,
            sentence.chunk_ids.len(),
            message_id
        );
        Ok(self.highlight.insert(SentenceHighlight {
            sentence_id: sentence.id,
            message_id,
            chunk_ids: sentence.chunk_ids,
        }))
    }

    /// Playback of one sentence finished.
    pub fn acknowledge(&mut self, sentence_id: &str) -> Acknowledged {
        let cue = self
            .cues
            .iter()
            .position(|c| c.id == sentence_id)
            .map(|idx| self.cues.remove(idx));

        let highlight_cleared = self.clear_on_done
            && self
                .highlight
                .as_ref()
                .is_some_and(|h| h.sentence_id == sentence_id);
        if highlight_cleared {
            self.highlight = None;
        }
        Acknowledged {
            cue,
            highlight_cleared,
        }
    }

    /// Drop cues and highlight belonging to a removed message.
    /// Returns true if the highlight was dropped.
    pub fn forget_message(&mut self, message_id: &str) -> bool {
        self.cues.retain(|c| c.message_id != message_id);
        self.message_order.retain(|m| m != message_id);
        let dropped = self
            .highlight
            .as_ref()
            .is_some_and(|h| h.message_id == message_id);
        if dropped {
            self.highlight = None;
        }
        dropped
    }

    pub fn reset(&mut self) {
        self.highlight = None;
        self.cues.clear();
        self.message_order.clear();
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(true)
    }
}
