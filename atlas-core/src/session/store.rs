//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::truncate_chars;

/// Title given to sessions that have no user message yet
pub const PLACEHOLDER_TITLE: &str = "New conversation";

/// Maximum characters kept when deriving a title from a message
pub const TITLE_MAX_CHARS: usize = 50;

/// Maximum characters shown when a placeholder title is displayed
/// using the first user message instead
pub const DISPLAY_TITLE_MAX_CHARS: usize = 30;

/// Identifier of a chat session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Title shown in the session list
    pub title: String,
    /// Messages in insertion order
    pub messages: Vec<Message>,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session with the placeholder title
    pub fn new() -> Self {
        Self::with_title(PLACEHOLDER_TITLE)
    }

    /// Create an empty session with the given title
    pub fn with_title(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the title is still the placeholder
    pub fn has_placeholder_title(&self) -> bool {
        self.title == PLACEHOLDER_TITLE
    }

    /// Append a message and bump the update time
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Title for listings: the stored title unless it is the placeholder,
    /// then the first user message, then the placeholder.
    pub fn display_title(&self) -> String {
        if !self.title.is_empty() && !self.has_placeholder_title() {
            return self.title.clone();
        }

        self.messages
            .iter()
            .find(|m| m.is_user)
            .map(|m| truncate_chars(m.content.trim(), DISPLAY_TITLE_MAX_CHARS))
            .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string())
    }

    /// Compact view used by session listings
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.display_title(),
            message_count: self.messages.len(),
            updated_at: self.updated_at,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identifier, unique within its session
    pub id: String,
    /// Message text
    pub content: String,
    /// True for user messages, false for assistant messages
    pub is_user: bool,
    /// Message timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, true)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, false)
    }

    fn new(content: impl Into<String>, is_user: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            is_user,
            timestamp: Utc::now(),
        }
    }
}

/// Session list entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Derive a session title from the text of a user message
pub fn derive_title(text: &str) -> String {
    truncate_chars(text, TITLE_MAX_CHARS)
}
