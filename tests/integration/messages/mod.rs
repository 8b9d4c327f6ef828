//! Message endpoint tests: history pages, full history, create, translate

use axum::http::StatusCode;
use chrono::Duration;
use helphub_llm::mock::MockLlmService;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::{at, body_json, get, message, post_json, TestApp, CONVERSATION};

fn response_ids(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect()
}

/// `count` messages one second apart, ids `m0..`
fn seed_many(app: &TestApp, count: usize) {
    app.messages.seed((0..count).map(|i| {
        let mut m = message(&format!("m{i}"), 0);
        m.timestamp = at(0) + Duration::seconds(i as i64);
        m
    }));
}

mod test_list_messages {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_pages_are_newest_first() {
        let app = TestApp::new();
        app.messages
            .seed((1..=5).map(|i| message(&i.to_string(), i)));

        let response = app
            .router()
            .oneshot(get("/v1/messages?conversationId=c-1&limit=2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(response_ids(&body), vec!["5", "4"]);
        assert_eq!(body[0]["senderId"], "volunteer-1");
        assert_eq!(body[0]["senderName"], "Iryna Bondar");
        assert_eq!(body[0]["conversationId"], CONVERSATION);

        let response = app
            .router()
            .oneshot(get("/v1/messages?conversationId=c-1&offset=2&limit=2"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(response_ids(&body), vec!["3", "2"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_limit_defaults_to_configured_page_size() {
        let mut app = TestApp::new();
        seed_many(&app, 30);

        let response = app
            .router()
            .oneshot(get("/v1/messages?conversationId=c-1"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 20);

        app.page_size = 7;
        let response = app
            .router()
            .oneshot(get("/v1/messages?conversationId=c-1"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 7);
    }

    #[test_log::test(tokio::test)]
    async fn test_limit_is_clamped() {
        let app = TestApp::new();
        seed_many(&app, 120);

        let response = app
            .router()
            .oneshot(get("/v1/messages?conversationId=c-1&limit=500"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 100);

        let response = app
            .router()
            .oneshot(get("/v1/messages?conversationId=c-1&limit=0"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(response_ids(&body), vec!["m119"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_offset_past_the_end_is_empty() {
        let app = TestApp::new();
        seed_many(&app, 3);

        let response = app
            .router()
            .oneshot(get("/v1/messages?conversationId=c-1&offset=20"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_conversation_id_is_rejected() {
        let app = TestApp::new();

        for uri in ["/v1/messages", "/v1/messages?conversationId=%20"] {
            let response = app.router().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
        assert!(app.messages.page_requests().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_store_outage_is_bad_gateway() {
        let app = TestApp::new();
        app.messages.set_read_failure(true);

        let response = app
            .router()
            .oneshot(get("/v1/messages?conversationId=c-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"]["code"], "UPSTREAM_ERROR");
    }
}

mod test_list_all_messages {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_full_history_is_chronological() {
        let app = TestApp::new();
        app.messages
            .seed([message("3", 3), message("1", 1), message("2", 2)]);

        let response = app
            .router()
            .oneshot(get("/v1/messages/all?conversationId=c-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response_ids(&body_json(response).await),
            vec!["1", "2", "3"]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_full_history_requires_conversation_id() {
        let app = TestApp::new();

        let response = app
            .router()
            .oneshot(get("/v1/messages/all"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod test_create_message {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_create_returns_stored_record() {
        let app = TestApp::new();
        app.messages.register_sender("user-1", "Olena Koval");

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/messages",
                json!({"conversationId": "c-1", "senderId": "user-1", "text": " I need a ride "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["text"], "I need a ride");
        assert_eq!(body["senderName"], "Olena Koval");
        assert!(body["timestamp"].is_string());

        let stored = app.messages.stored(CONVERSATION);
        assert_eq!(stored.len(), 1);
        assert_eq!(body["id"], stored[0].id.as_str());
    }

    #[test_log::test(tokio::test)]
    async fn test_blank_fields_are_rejected() {
        let app = TestApp::new();

        for body in [
            json!({"conversationId": "c-1", "senderId": "user-1", "text": "   "}),
            json!({"conversationId": "", "senderId": "user-1", "text": "hello"}),
            json!({"conversationId": "c-1", "senderId": " ", "text": "hello"}),
            json!({"conversationId": "c-1", "text": "hello"}),
        ] {
            let response = app
                .router()
                .oneshot(post_json("/v1/messages", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(app.messages.create_calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_store_outage_is_bad_gateway() {
        let app = TestApp::new();
        app.messages.set_write_failure(true);

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/messages",
                json!({"conversationId": "c-1", "senderId": "user-1", "text": "hello"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(app.messages.stored(CONVERSATION).is_empty());
    }
}

mod test_translate {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_translation_strips_wrapping_quotes() {
        let app = TestApp::with_llm(MockLlmService::with_reply("\"Мені потрібна допомога\""));

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/messages/translate",
                json!({"text": "I need help", "targetLanguage": "ukrainian"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"translatedText": "Мені потрібна допомога"})
        );

        let requests = app.llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].messages[0].content.contains("I need help"));
        assert!(requests[0]
            .system_prompt
            .as_deref()
            .is_some_and(|prompt| prompt.contains("Ukrainian")));
    }

    #[test_log::test(tokio::test)]
    async fn test_unsupported_language_is_rejected() {
        let app = TestApp::new();

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/messages/translate",
                json!({"text": "hello", "targetLanguage": "french"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.llm.recorded_requests().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_blank_text_is_rejected() {
        let app = TestApp::new();

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/messages/translate",
                json!({"text": "  ", "targetLanguage": "english"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.llm.recorded_requests().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_model_failure_is_bad_gateway() {
        let app = TestApp::with_llm(MockLlmService::failing());

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/messages/translate",
                json!({"text": "hello", "targetLanguage": "ukrainian"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
