//! Message repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{display_name, ChatMessage, NewMessage};
use crate::store::{require_conversation_id, MessageStore, PageRequest, StoreError};

/// A `messages` row joined with the sender's profile
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub id: Uuid,
    pub message_text: Option<String>,
    pub sender_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub sender_first_name: Option<String>,
    pub sender_surname: Option<String>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        ChatMessage {
            id: row.id.to_string(),
            text: row.message_text.unwrap_or_default(),
            sender_id: row.sender_id.map(|id| id.to_string()).unwrap_or_default(),
            sender_name: display_name(
                row.sender_first_name.as_deref(),
                row.sender_surname.as_deref(),
            ),
            timestamp: row.created_at,
            conversation_id: row
                .conversation_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }
}

pub(crate) fn parse_id(field: &str, value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| StoreError::Rejected(format!("{field} must be a UUID, got '{value}'")))
}

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageStore for MessageRepository {
    /// Page of messages, newest first, with best-effort sender names
    async fn fetch_page(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        require_conversation_id(conversation_id)?;
        let conversation_id = parse_id("conversationId", conversation_id)?;

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.message_text, m.sender_id, m.conversation_id, m.created_at,
                   p.name AS sender_first_name, p.surname AS sender_surname
            FROM messages m
            LEFT JOIN user_profiles p ON p.id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.created_at DESC, m.id DESC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(i64::from(page.offset))
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    /// Insert a message; id and created_at come from column defaults
    async fn create(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        require_conversation_id(&message.conversation_id)?;
        let conversation_id = parse_id("conversationId", &message.conversation_id)?;
        let sender_id = parse_id("senderId", &message.sender_id)?;

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            WITH inserted AS (
                INSERT INTO messages (conversation_id, sender_id, message_text)
                VALUES ($1, $2, $3)
                RETURNING id, message_text, sender_id, conversation_id, created_at
            )
            SELECT i.id, i.message_text, i.sender_id, i.conversation_id, i.created_at,
                   p.name AS sender_first_name, p.surname AS sender_surname
            FROM inserted i
            LEFT JOIN user_profiles p ON p.id = i.sender_id
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(&message.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Full history, oldest first
    async fn fetch_all(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        require_conversation_id(conversation_id)?;
        let conversation_id = parse_id("conversationId", conversation_id)?;

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.message_text, m.sender_id, m.conversation_id, m.created_at,
                   p.name AS sender_first_name, p.surname AS sender_surname
            FROM messages m
            LEFT JOIN user_profiles p ON p.id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }
}
