//! Persisted conversation sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::SessionId;
use crate::chat::core::message::Message;

/// Maximum number of characters kept from the first user message in a title.
pub const TITLE_MAX_CHARS: usize = 30;

/// Marker appended to truncated titles.
pub const TITLE_ELLIPSIS: &str = "...";

/// Title used when the first message carries no text.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// One persisted conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Title derived once from the first user message.
    pub title: String,
    /// Messages in conversation order. Never empty.
    pub messages: Vec<Message>,
    /// Creation time, the eviction key.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a session from its first message.
    #[must_use]
    pub fn start(first_message: Message) -> Self {
        Self {
            id: SessionId::new(),
            title: derive_title(&first_message.content),
            messages: vec![first_message],
            created_at: Utc::now(),
        }
    }
}

/// Derive a session title from the first user message.
#[must_use]
pub fn derive_title(content: &str) -> String {
    if content.trim().is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    let mut chars = content.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}{TITLE_ELLIPSIS}")
    } else {
        head
    }
}

/// Keep only the newest `limit` sessions, ordered by `created_at` descending.
///
/// Sorts explicitly instead of trusting the incoming order, so a caller that
/// appended out of order still evicts the oldest sessions. Returns the number
/// of evicted sessions.
pub fn enforce_history_limit(sessions: &mut Vec<Session>, limit: usize) -> usize {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let evicted = sessions.len().saturating_sub(limit);
    sessions.truncate(limit);
    evicted
}
