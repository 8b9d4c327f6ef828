//! Conversations domain: chat history, live reconciliation, AI text services
//!
//! - [`store`]: the history store contract and its in-memory and HTTP clients
//! - [`repository`]: the Postgres history store
//! - [`channel`]: the live channel contract and the in-process hub
//! - [`session`]: the reconciler that merges history and live events
//! - [`api`]: the HTTP endpoints served by the application

pub mod api;
pub mod channel;
pub mod domain;
pub mod repository;
pub mod session;
pub mod store;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{ChatMessage, ConversationParticipants, Identity, NewMessage};
pub use domain::state::{ConnectionEvent, ConnectionState, ConnectionStateMachine, StateError};
pub use domain::timeline::{MessageTimeline, Origin, ViewChange};

pub use channel::{ChannelEnvelope, ChannelError, LiveChannel, LocalChannelHub, Subscription};
pub use session::{ChatConfig, ChatError, ChatSession, ChatSnapshot};
pub use store::{
    ConversationStore, HttpMessageStore, HttpStoreConfig, InMemoryConversationStore,
    InMemoryMessageStore, MessageStore, PageRequest, StoreError,
};

// Re-export repository types
pub use repository::{ConversationRepository, ConversationsRepositories, MessageRepository};

// Re-export API types
pub use api::routes::routes;
pub use api::ConversationsState;
