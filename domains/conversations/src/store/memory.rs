//! In-memory history store
//!
//! Backs local runs without a database and the scenario tests. Reads and
//! writes can be made to fail, or held open, to exercise the chat session's
//! failure and in-flight paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::{require_conversation_id, ConversationStore, MessageStore, PageRequest, StoreError};
use crate::domain::entities::{ChatMessage, ConversationParticipants, NewMessage};

#[derive(Debug, Default)]
struct MessageLog {
    messages: Vec<ChatMessage>,
    sender_names: HashMap<String, String>,
    page_requests: Vec<(String, PageRequest)>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    log: Arc<Mutex<MessageLog>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    create_calls: Arc<AtomicUsize>,
    read_gate: Arc<tokio::sync::Mutex<()>>,
    write_gate: Arc<tokio::sync::Mutex<()>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add already persisted messages
    pub fn seed(&self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.lock().messages.extend(messages);
    }

    /// Display name attached to messages created by `sender_id`
    pub fn register_sender(&self, sender_id: impl Into<String>, name: impl Into<String>) {
        self.lock()
            .sender_names
            .insert(sender_id.into(), name.into());
    }

    pub fn set_read_failure(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Block page reads until the returned guard is dropped
    pub async fn hold_reads(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.read_gate).lock_owned().await
    }

    /// Block writes until the returned guard is dropped
    pub async fn hold_writes(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.write_gate).lock_owned().await
    }

    /// Every page requested so far, in call order
    pub fn page_requests(&self) -> Vec<(String, PageRequest)> {
        self.lock().page_requests.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// All stored messages of a conversation, chronological
    pub fn stored(&self, conversation_id: &str) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self
            .lock()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        messages
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MessageLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn fetch_page(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        require_conversation_id(conversation_id)?;
        let _gate = self.read_gate.lock().await;

        self.lock()
            .page_requests
            .push((conversation_id.to_string(), page));
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store configured to fail reads".to_string(),
            ));
        }

        let mut messages = self.stored(conversation_id);
        messages.reverse();
        Ok(messages
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn create(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        require_conversation_id(&message.conversation_id)?;
        let _gate = self.write_gate.lock().await;

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store configured to fail writes".to_string(),
            ));
        }

        let mut log = self.lock();
        let created = ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender_name: log
                .sender_names
                .get(&message.sender_id)
                .cloned()
                .unwrap_or_default(),
            text: message.text,
            sender_id: message.sender_id,
            timestamp: Utc::now(),
            conversation_id: message.conversation_id,
        };
        log.messages.push(created.clone());
        Ok(created)
    }

    async fn fetch_all(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        require_conversation_id(conversation_id)?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store configured to fail reads".to_string(),
            ));
        }
        Ok(self.stored(conversation_id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<Mutex<HashMap<String, ConversationParticipants>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conversation: ConversationParticipants) {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation.id.clone(), conversation);
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationParticipants>, StoreError> {
        require_conversation_id(conversation_id)?;
        Ok(self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .cloned())
    }
}
