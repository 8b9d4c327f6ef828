//! Request handlers

pub mod chatbot;
pub mod conversations;
pub mod help_requests;
pub mod messages;

use helphub_common::Error;
use helphub_llm::LlmError;

/// Language model failures surface as upstream errors, except a request the
/// model found too vague, which is the caller's to fix
pub(crate) fn llm_error(err: LlmError) -> Error {
    match err {
        LlmError::RateLimit => Error::RateLimit("Language model rate limit exceeded".to_string()),
        LlmError::InsufficientInformation(message) => Error::Validation(message),
        other => Error::Upstream(other.to_string()),
    }
}

/// `validator` check for text that must contain something besides whitespace
pub(crate) fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}
