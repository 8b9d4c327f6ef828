//! Help request extraction handler

use axum::{extract::State, Json};
use helphub_common::{Result, ValidatedJson};
use helphub_llm::ParsedHelpRequest;
use serde::Deserialize;
use validator::Validate;

use super::{llm_error, not_blank};
use crate::api::middleware::ConversationsState;

/// Free-form description of a help request
#[derive(Debug, Deserialize, Validate)]
pub struct ParseHelpRequestBody {
    #[validate(custom(function = "not_blank"), length(max = 5000))]
    pub text: String,
}

/// Turn free text into city, category, urgency and description.
///
/// Text the model finds too vague is a 400 carrying the model's request for
/// more details.
pub async fn parse_help_request(
    State(state): State<ConversationsState>,
    ValidatedJson(req): ValidatedJson<ParseHelpRequestBody>,
) -> Result<Json<ParsedHelpRequest>> {
    let parsed = helphub_llm::parse_help_request(state.llm.as_ref(), &req.text)
        .await
        .map_err(llm_error)?;

    tracing::info!(
        city = %parsed.city,
        category = parsed.category.label(),
        urgency = parsed.urgency.label(),
        "Help request text parsed"
    );
    Ok(Json(parsed))
}
