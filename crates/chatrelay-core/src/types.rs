use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for one conversation's history window.
///
/// A group id, a user id, or a `sender:recipient` pair for private replies.
/// Compared by exact string match; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(pub String);

impl ConversationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a private exchange between two accounts: `{from}:{to}`.
    pub fn pair(from: &str, to: &str) -> Self {
        Self(format!("{}:{}", from, to))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConversationKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Speaker of a stored turn. Serialized lowercase, matching the chat
/// completion wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    System,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::System => write!(f, "system"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One exchanged message. Never mutated once stored in a history window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// How an inbound message should be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Text completion with conversation history.
    #[default]
    Chat,
    /// Stateless image generation; replies are image URLs.
    Image,
}

impl fmt::Display for ReplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyMode::Chat => write!(f, "chat"),
            ReplyMode::Image => write!(f, "image"),
        }
    }
}
