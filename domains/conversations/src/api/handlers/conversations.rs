//! Conversation API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use helphub_common::{Error, Result, ValidatedJson};
use helphub_llm::{Participant, SummaryInput, TitleInput, TranscriptLine};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::llm_error;
use crate::api::middleware::ConversationsState;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// Help request context for a chat title
#[derive(Debug, Default, Deserialize, Validate)]
pub struct TitleRequest {
    #[validate(length(max = 200))]
    pub city: Option<String>,
    #[validate(length(max = 200))]
    pub category: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub title: String,
}

/// Summarize a conversation between a user and a volunteer
pub async fn summarize_conversation(
    State(state): State<ConversationsState>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>> {
    let conversation = state
        .conversations
        .find_participants(&id)
        .await?
        .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

    let messages = state.messages.fetch_all(&conversation.id).await?;
    if messages.is_empty() {
        return Err(Error::Validation(
            "Conversation has no messages to summarize".to_string(),
        ));
    }

    let input = SummaryInput {
        title: conversation.name,
        user: Participant {
            id: conversation.user_id,
            name: conversation.user_name,
        },
        volunteer: Participant {
            id: conversation.volunteer_id,
            name: conversation.volunteer_name,
        },
        messages: messages
            .into_iter()
            .map(|m| TranscriptLine {
                sender_id: m.sender_id,
                text: m.text,
            })
            .collect(),
    };

    let summary = helphub_llm::summarize_conversation(state.llm.as_ref(), &input)
        .await
        .map_err(llm_error)?;

    tracing::info!(conversation_id = %conversation.id, "Conversation summarized");
    Ok(Json(SummaryResponse { summary }))
}

/// Generate a chat title from help request details; never fails on model errors
pub async fn generate_title(
    State(state): State<ConversationsState>,
    ValidatedJson(req): ValidatedJson<TitleRequest>,
) -> Result<Json<TitleResponse>> {
    let input = TitleInput {
        city: req.city,
        category: req.category,
        description: req.description,
    };
    let title = helphub_llm::generate_chat_title(state.llm.as_ref(), &input).await;
    Ok(Json(TitleResponse { title }))
}
