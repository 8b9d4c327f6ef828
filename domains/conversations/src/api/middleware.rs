//! Conversations domain state

use std::sync::Arc;

use helphub_llm::LlmService;

use crate::repository::ConversationsRepositories;
use crate::store::{ConversationStore, MessageStore};

/// Application state for the Conversations domain
#[derive(Clone)]
pub struct ConversationsState {
    pub messages: Arc<dyn MessageStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub llm: Arc<dyn LlmService>,
    /// Page size served when a request gives no `limit`
    pub page_size: u32,
}

impl ConversationsState {
    /// State backed by Postgres repositories
    pub fn from_repositories(
        repos: ConversationsRepositories,
        llm: Arc<dyn LlmService>,
        page_size: u32,
    ) -> Self {
        Self {
            messages: Arc::new(repos.messages),
            conversations: Arc::new(repos.conversations),
            llm,
            page_size,
        }
    }
}
