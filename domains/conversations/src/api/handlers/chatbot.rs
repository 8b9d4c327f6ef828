//! Help assistant chatbot handler

use axum::{extract::State, Json};
use helphub_common::{Result, ValidatedJson};
use helphub_llm::{LlmMessage, LlmRole, UserContext};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::llm_error;
use crate::api::middleware::ConversationsState;

const MAX_TURN_CHARS: usize = 5000;

/// One earlier turn of the assistant conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotTurn {
    pub role: LlmRole,
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotRequest {
    #[validate(length(min = 1, max = 50), custom(function = "valid_turns"))]
    pub messages: Vec<ChatbotTurn>,
    #[serde(default)]
    pub user_context: UserContext,
}

#[derive(Debug, Serialize)]
pub struct ChatbotResponse {
    pub response: String,
}

fn valid_turns(turns: &[ChatbotTurn]) -> std::result::Result<(), ValidationError> {
    for turn in turns {
        if turn.content.trim().is_empty() {
            return Err(ValidationError::new("blank_turn"));
        }
        if turn.content.chars().count() > MAX_TURN_CHARS {
            return Err(ValidationError::new("turn_too_long"));
        }
    }
    Ok(())
}

/// Reply to the latest turn of a help assistant conversation
pub async fn chatbot_reply(
    State(state): State<ConversationsState>,
    ValidatedJson(req): ValidatedJson<ChatbotRequest>,
) -> Result<Json<ChatbotResponse>> {
    let history: Vec<LlmMessage> = req
        .messages
        .into_iter()
        .map(|turn| LlmMessage {
            role: turn.role,
            content: turn.content,
        })
        .collect();

    let response = helphub_llm::chatbot_reply(state.llm.as_ref(), &history, &req.user_context)
        .await
        .map_err(llm_error)?;

    tracing::debug!(turns = history.len(), "Chatbot replied");
    Ok(Json(ChatbotResponse { response }))
}
