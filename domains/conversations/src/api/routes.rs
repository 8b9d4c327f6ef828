//! Route definitions for Conversations domain API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{chatbot, conversations, help_requests, messages};
use super::middleware::ConversationsState;

/// Message history and message text routes
fn message_routes() -> Router<ConversationsState> {
    Router::new()
        .route(
            "/v1/messages",
            get(messages::list_messages).post(messages::create_message),
        )
        .route("/v1/messages/all", get(messages::list_all_messages))
        .route("/v1/messages/translate", post(messages::translate_message))
}

/// Conversation-level AI routes
fn conversation_routes() -> Router<ConversationsState> {
    Router::new()
        .route(
            "/v1/conversations/{id}/summary",
            post(conversations::summarize_conversation),
        )
        .route("/v1/conversations/title", post(conversations::generate_title))
}

/// Model-backed helpers outside a conversation
fn assistant_routes() -> Router<ConversationsState> {
    Router::new()
        .route(
            "/v1/help-requests/parse",
            post(help_requests::parse_help_request),
        )
        .route("/v1/chatbot", post(chatbot::chatbot_reply))
}

/// Create all Conversations domain API routes
pub fn routes() -> Router<ConversationsState> {
    Router::new()
        .merge(message_routes())
        .merge(conversation_routes())
        .merge(assistant_routes())
}
