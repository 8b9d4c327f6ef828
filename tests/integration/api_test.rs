//! API endpoint integration tests
//!
//! The full application router over in-memory stores and a mock language model.

mod assistant;
mod common;
mod conversations;
mod messages;

use axum::http::StatusCode;
use tower::ServiceExt;

use common::{body_text, get, TestApp};

#[test_log::test(tokio::test)]
async fn test_health_check() {
    let app = TestApp::new();

    let response = app.router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[test_log::test(tokio::test)]
async fn test_root_reports_version() {
    let app = TestApp::new();

    let response = app.router().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("HelpHub API"));
}

#[test_log::test(tokio::test)]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();

    let response = app.router().oneshot(get("/v1/nothing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
