//! HTTP client for a remote history API
//!
//! Talks to the `/v1/messages` endpoints served by `helphub-app`, so a chat
//! session can run in a process that has no database access.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{require_conversation_id, MessageStore, PageRequest, StoreError};
use crate::domain::entities::{ChatMessage, NewMessage};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub base_url: String,
    /// Per-request timeout applied by the client
    pub timeout: Duration,
}

impl HttpStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct HttpMessageStore {
    client: Client,
    base_url: String,
}

impl HttpMessageStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

fn classify_status(status: StatusCode, body: String) -> StoreError {
    let detail = format!("{status}: {body}");
    if status.is_client_error() {
        StoreError::Rejected(detail)
    } else {
        StoreError::Unavailable(detail)
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError::Unavailable(format!("HTTP request failed: {err}"))
}

#[async_trait::async_trait]
impl MessageStore for HttpMessageStore {
    async fn fetch_page(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        require_conversation_id(conversation_id)?;
        tracing::debug!(
            conversation_id = %conversation_id,
            offset = page.offset,
            limit = page.limit,
            "Fetching history page"
        );

        let response = self
            .client
            .get(format!("{}/v1/messages", self.base_url))
            .query(&[
                ("conversationId", conversation_id.to_string()),
                ("offset", page.offset.to_string()),
                ("limit", page.limit.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let mut messages: Vec<ChatMessage> = Self::decode(response).await?;
        // Never hand back more than asked for, whatever the server did
        messages.truncate(page.limit as usize);
        Ok(messages)
    }

    async fn create(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        require_conversation_id(&message.conversation_id)?;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&message)
            .send()
            .await
            .map_err(transport_error)?;

        Self::decode(response).await
    }

    async fn fetch_all(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        require_conversation_id(conversation_id)?;

        let response = self
            .client
            .get(format!("{}/v1/messages/all", self.base_url))
            .query(&[("conversationId", conversation_id)])
            .send()
            .await
            .map_err(transport_error)?;

        Self::decode(response).await
    }
}
