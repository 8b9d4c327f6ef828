//! Message API handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use helphub_common::{Error, Pagination, Result, ValidatedJson};
use helphub_llm::TargetLanguage;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{llm_error, not_blank};
use crate::api::middleware::ConversationsState;
use crate::domain::entities::{ChatMessage, NewMessage};
use crate::store::PageRequest;

/// `conversationId` query parameter
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl ConversationQuery {
    fn require(self) -> Result<String> {
        self.conversation_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Validation("conversationId is required".to_string()))
    }
}

/// Request for storing a message
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    #[validate(custom(function = "not_blank"))]
    pub conversation_id: String,
    #[validate(custom(function = "not_blank"))]
    pub sender_id: String,
    #[validate(custom(function = "not_blank"))]
    pub text: String,
}

/// Message response DTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
}

impl From<ChatMessage> for MessageResponse {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            text: m.text,
            sender_id: m.sender_id,
            sender_name: m.sender_name,
            timestamp: m.timestamp,
            conversation_id: m.conversation_id,
        }
    }
}

/// Request for translating a chat message
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[validate(custom(function = "not_blank"))]
    pub text: String,
    pub target_language: TargetLanguage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_text: String,
}

/// List one page of a conversation's messages, newest first
pub async fn list_messages(
    State(state): State<ConversationsState>,
    Query(query): Query<ConversationQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<MessageResponse>>> {
    let conversation_id = query.require()?;
    let page = PageRequest::new(
        pagination.offset(),
        pagination.limit_or(state.page_size),
    )?;

    let messages = state.messages.fetch_page(&conversation_id, page).await?;

    tracing::debug!(
        conversation_id = %conversation_id,
        offset = page.offset,
        count = messages.len(),
        "Served history page"
    );
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// List a conversation's full history, oldest first
pub async fn list_all_messages(
    State(state): State<ConversationsState>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<MessageResponse>>> {
    let conversation_id = query.require()?;
    let messages = state.messages.fetch_all(&conversation_id).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// Store a message
pub async fn create_message(
    State(state): State<ConversationsState>,
    ValidatedJson(req): ValidatedJson<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let message = NewMessage::new(req.conversation_id, req.sender_id, req.text.trim())?;
    let created = state.messages.create(message).await?;

    tracing::info!(
        conversation_id = %created.conversation_id,
        message_id = %created.id,
        "Message stored"
    );
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Translate a message to Ukrainian or English
pub async fn translate_message(
    State(state): State<ConversationsState>,
    ValidatedJson(req): ValidatedJson<TranslateRequest>,
) -> Result<Json<TranslateResponse>> {
    let translated_text =
        helphub_llm::translate_message(state.llm.as_ref(), &req.text, req.target_language)
            .await
            .map_err(llm_error)?;

    Ok(Json(TranslateResponse { translated_text }))
}
