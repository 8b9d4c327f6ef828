//! Conversation endpoint tests: summaries and chat titles

use axum::http::StatusCode;
use helphub_llm::{mock::MockLlmService, FALLBACK_CHAT_TITLE};
use serde_json::json;
use tower::ServiceExt;

use crate::common::{body_json, message, post_json, TestApp, CONVERSATION};

mod test_summary {
    use super::*;
    use helphub_conversations::ChatMessage;

    fn from_user(id: &str, minute: u32, text: &str) -> ChatMessage {
        ChatMessage {
            sender_id: "user-1".to_string(),
            sender_name: "Olena Koval".to_string(),
            text: text.to_string(),
            ..message(id, minute)
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_summary_of_a_conversation() {
        let app = TestApp::with_llm(MockLlmService::with_reply(
            "  The user needed a ride to the clinic; the volunteer agreed to drive.  ",
        ));
        app.add_conversation(CONVERSATION, Some("Ride to the clinic"));
        app.messages.seed([
            from_user("1", 1, "Can anyone drive me to the clinic?"),
            ChatMessage {
                text: "I can, at 9".to_string(),
                ..message("2", 2)
            },
        ]);

        let response = app
            .router()
            .oneshot(post_json("/v1/conversations/c-1/summary", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["summary"],
            "The user needed a ride to the clinic; the volunteer agreed to drive."
        );

        let requests = app.llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        let transcript = &requests[0].messages[0].content;
        assert!(transcript.contains("Conversation Title: Ride to the clinic"));
        assert!(transcript.contains(
            "Participants: User Olena Koval (ID: user-1), Volunteer Iryna Bondar (ID: volunteer-1)"
        ));
        assert!(transcript.contains("[1] User (Olena Koval): Can anyone drive me to the clinic?"));
        assert!(transcript.contains("[2] Volunteer (Iryna Bondar): I can, at 9"));
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_conversation_is_not_found() {
        let app = TestApp::new();

        let response = app
            .router()
            .oneshot(post_json("/v1/conversations/c-404/summary", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
        assert!(app.llm.recorded_requests().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_conversation_without_messages_is_rejected() {
        let app = TestApp::new();
        app.add_conversation(CONVERSATION, None);

        let response = app
            .router()
            .oneshot(post_json("/v1/conversations/c-1/summary", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.llm.recorded_requests().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_model_failure_is_bad_gateway() {
        let app = TestApp::with_llm(MockLlmService::failing());
        app.add_conversation(CONVERSATION, None);
        app.messages.seed([message("1", 1)]);

        let response = app
            .router()
            .oneshot(post_json("/v1/conversations/c-1/summary", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}

mod test_title {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_title_from_request_details() {
        let app = TestApp::with_llm(MockLlmService::with_reply("\"Groceries for an elderly neighbour\""));

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/conversations/title",
                json!({
                    "city": "Lviv",
                    "category": "Groceries",
                    "description": "My neighbour cannot leave home this week"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["title"],
            "Groceries for an elderly neighbour"
        );

        let requests = app.llm.recorded_requests();
        assert!(requests[0].messages[0].content.contains("Location: Lviv"));
    }

    #[test_log::test(tokio::test)]
    async fn test_long_title_is_truncated() {
        let app = TestApp::with_llm(MockLlmService::with_reply("x".repeat(80)));

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/conversations/title",
                json!({"description": "Need help moving furniture"}),
            ))
            .await
            .unwrap();
        let title = body_json(response).await["title"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(title.chars().count(), 50);
        assert!(title.ends_with("..."));
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_details_use_fallback_without_model_call() {
        let app = TestApp::new();

        let response = app
            .router()
            .oneshot(post_json("/v1/conversations/title", json!({"city": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["title"], FALLBACK_CHAT_TITLE);
        assert!(app.llm.recorded_requests().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_model_failure_uses_fallback() {
        let app = TestApp::with_llm(MockLlmService::failing());

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/conversations/title",
                json!({"category": "Transport"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["title"], FALLBACK_CHAT_TITLE);
    }

    #[test_log::test(tokio::test)]
    async fn test_oversized_description_is_rejected() {
        let app = TestApp::new();

        let response = app
            .router()
            .oneshot(post_json(
                "/v1/conversations/title",
                json!({"description": "a".repeat(5001)}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
