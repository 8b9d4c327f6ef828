//! Conversation repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{display_name, ConversationParticipants};
use crate::store::{require_conversation_id, ConversationStore, StoreError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ParticipantsRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub user_id: Option<Uuid>,
    pub volunteer_id: Option<Uuid>,
    pub user_profile_id: Option<Uuid>,
    pub user_first_name: Option<String>,
    pub user_surname: Option<String>,
    pub volunteer_profile_id: Option<Uuid>,
    pub volunteer_first_name: Option<String>,
    pub volunteer_surname: Option<String>,
}

impl From<ParticipantsRow> for ConversationParticipants {
    fn from(row: ParticipantsRow) -> Self {
        let user_name = match row.user_profile_id {
            Some(_) => display_name(row.user_first_name.as_deref(), row.user_surname.as_deref()),
            None => "User".to_string(),
        };
        let volunteer_name = match row.volunteer_profile_id {
            Some(_) => display_name(
                row.volunteer_first_name.as_deref(),
                row.volunteer_surname.as_deref(),
            ),
            None => "Volunteer".to_string(),
        };

        ConversationParticipants {
            id: row.id.to_string(),
            name: row.name,
            user_id: row.user_id.map(|id| id.to_string()).unwrap_or_default(),
            volunteer_id: row.volunteer_id.map(|id| id.to_string()).unwrap_or_default(),
            user_name,
            volunteer_name,
        }
    }
}

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationStore for ConversationRepository {
    /// Find a conversation with both participants' display names
    async fn find_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationParticipants>, StoreError> {
        require_conversation_id(conversation_id)?;
        // An id that is not a UUID cannot name an existing conversation
        let Ok(id) = Uuid::parse_str(conversation_id.trim()) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, ParticipantsRow>(
            r#"
            SELECT c.id, c.name, c.user_id, c.volunteer_id,
                   up.id AS user_profile_id,
                   up.name AS user_first_name, up.surname AS user_surname,
                   vp.id AS volunteer_profile_id,
                   vp.name AS volunteer_first_name, vp.surname AS volunteer_surname
            FROM conversations c
            LEFT JOIN user_profiles up ON up.id = c.user_id
            LEFT JOIN user_profiles vp ON vp.id = c.volunteer_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ConversationParticipants::from))
    }
}
