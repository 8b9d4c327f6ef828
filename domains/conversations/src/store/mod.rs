//! History store: paginated access to persisted chat messages
//!
//! The chat session and the HTTP handlers only see the [`MessageStore`] and
//! [`ConversationStore`] traits. Implementations:
//! - [`crate::repository::MessageRepository`]: Postgres via sqlx
//! - [`http::HttpMessageStore`]: a remote history API via reqwest
//! - [`memory::InMemoryMessageStore`]: local runs and tests

pub mod http;
pub mod memory;

use thiserror::Error;

use crate::domain::entities::{ChatMessage, ConversationParticipants, NewMessage};

pub use http::{HttpMessageStore, HttpStoreConfig};
pub use memory::{InMemoryConversationStore, InMemoryMessageStore};

#[derive(Error, Debug)]
pub enum StoreError {
    /// Transient: transport failure, timeout, 5xx. Safe to retry.
    #[error("History store unavailable: {0}")]
    Unavailable(String),

    #[error("History store rejected the request: {0}")]
    Rejected(String),

    #[error("Failed to decode history store response: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db)
                if db.is_foreign_key_violation() || db.is_check_violation() =>
            {
                StoreError::Rejected(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Decode(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<StoreError> for helphub_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(msg) => helphub_common::Error::Validation(msg),
            StoreError::Unavailable(msg) => helphub_common::Error::Upstream(msg),
            StoreError::Decode(msg) => helphub_common::Error::Internal(msg),
        }
    }
}

/// A slice of history, counted from the newest message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(offset: u32, limit: u32) -> Result<Self, StoreError> {
        if limit == 0 {
            return Err(StoreError::Rejected(
                "page limit must be greater than zero".to_string(),
            ));
        }
        Ok(Self { offset, limit })
    }

    /// The `index`-th page (zero based) of `page_size` messages
    pub fn page(index: u32, page_size: u32) -> Result<Self, StoreError> {
        Self::new(index.saturating_mul(page_size), page_size)
    }
}

/// Persistent message history for conversations.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch one page, newest first. A page shorter than `limit` is the last one.
    async fn fetch_page(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    /// Persist a message; the returned record carries the store's id and timestamp.
    async fn create(&self, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// Fetch the whole conversation in chronological order.
    async fn fetch_all(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, StoreError>;
}

/// Lookup of conversation participants.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationParticipants>, StoreError>;
}

pub(crate) fn require_conversation_id(conversation_id: &str) -> Result<(), StoreError> {
    if conversation_id.trim().is_empty() {
        return Err(StoreError::Rejected(
            "conversationId must not be empty".to_string(),
        ));
    }
    Ok(())
}
