//! Domain entities for the Conversations domain
//!
//! Chat messages as exchanged with the history store and the live channel,
//! the sender identity a chat session acts as, and the presence payloads
//! announced when a participant joins or leaves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use helphub_common::{Error, Result};

/// A chat message. Identity is `id`, display order is `timestamp` ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    /// Best-effort display name; empty when the sender has no profile
    #[serde(default)]
    pub sender_name: String,
    #[serde(alias = "createdAt")]
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
}

impl ChatMessage {
    /// Ordering key used by the merged view: timestamp, then id.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, self.id.as_str())
    }
}

/// A message to persist. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
}

impl NewMessage {
    /// Build a new message, rejecting blank fields.
    pub fn new(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self> {
        let message = Self {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            text: text.into(),
        };
        message.validate()?;
        Ok(message)
    }

    pub fn validate(&self) -> Result<()> {
        if self.conversation_id.trim().is_empty() {
            return Err(Error::Validation("conversationId is required".to_string()));
        }
        if self.sender_id.trim().is_empty() {
            return Err(Error::Validation("senderId is required".to_string()));
        }
        if self.text.trim().is_empty() {
            return Err(Error::Validation("Message text must not be blank".to_string()));
        }
        Ok(())
    }
}

/// The local participant a chat session acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Payload of a `user-joined` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoined {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload of a `user-left` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

/// The two participants of a help conversation, as needed for summaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationParticipants {
    pub id: String,
    pub name: Option<String>,
    pub user_id: String,
    pub volunteer_id: String,
    pub user_name: String,
    pub volunteer_name: String,
}

/// Join profile name parts into a display name, `"{name} {surname}"` trimmed.
pub fn display_name(name: Option<&str>, surname: Option<&str>) -> String {
    format!("{} {}", name.unwrap_or_default(), surname.unwrap_or_default())
        .trim()
        .to_string()
}
