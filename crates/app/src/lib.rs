//! HelpHub application composition root
//!
//! Composes the domain routers and shared layers into a single application.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    Router,
};
use helphub_common::Config;
use helphub_conversations::{ConversationsRepositories, ConversationsState};
use helphub_llm::{LlmConfig, LlmServiceFactory};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the main application router backed by Postgres
pub async fn create_app(config: Config, pool: PgPool) -> Result<Router, anyhow::Error> {
    let llm_config = LlmConfig::from_env()?;
    let llm = LlmServiceFactory::create(llm_config)?;

    let state = ConversationsState::from_repositories(
        ConversationsRepositories::new(pool),
        Arc::from(llm),
        config.message_page_size,
    );

    tracing::info!(
        page_size = config.message_page_size,
        "Conversations domain configured"
    );

    Ok(build_router(state))
}

/// Compose domain routers with the shared infrastructure routes
pub fn build_router(state: ConversationsState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { "HelpHub API v0.0.1-SNAPSHOT" }),
        )
        .merge(helphub_conversations::routes().with_state(state))
}

/// CORS layer for a comma separated origin list; unparsable origins are skipped
pub fn build_cors_layer(origins: &str) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn body_limit_layer() -> DefaultBodyLimit {
    DefaultBodyLimit::max(MAX_BODY_BYTES)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
