use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a conversation for the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    #[serde(rename = "name", alias = "title")]
    pub title: String,
    /// ISO-8601 timestamp as reported by the backend
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
}

impl ChatSummary {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        last_updated: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            last_updated: last_updated.into(),
        }
    }

    /// Parsed `last_updated`. Accepts RFC 3339 and naive ISO timestamps
    /// (interpreted as UTC).
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.last_updated) {
            return Some(dt.with_timezone(&Utc));
        }
        chrono::NaiveDateTime::parse_from_str(&self.last_updated, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Catalog entries sorted newest first; unparseable timestamps sort last
/// and keep their relative order.
pub fn sort_by_recency(chats: &[ChatSummary]) -> Vec<ChatSummary> {
    let mut sorted = chats.to_vec();
    sorted.sort_by(|a, b| match (a.last_updated_at(), b.last_updated_at()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted
}
