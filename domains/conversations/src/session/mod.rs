//! Chat session: the live conversation reconciler
//!
//! A [`ChatSession`] is a cheap, cloneable handle to an actor task that owns
//! everything about one open conversation: the merged [`MessageTimeline`], the
//! connection state, presence, and the channel membership. Commands go through
//! a single mailbox and are answered over oneshot replies. History fetches and
//! persistence run in sub-tasks that post their results back to the mailbox, so
//! live events keep flowing while they are in flight.
//!
//! Consumers render from [`ChatSnapshot`]s published on a watch channel.
//!
//! [`MessageTimeline`]: crate::domain::timeline::MessageTimeline

mod actor;

use std::sync::Arc;

use helphub_common::config::{DEFAULT_MESSAGE_PAGE_SIZE, MAX_MESSAGE_PAGE_SIZE};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::channel::{ChannelError, LiveChannel, LocalChannelHub};
use crate::domain::entities::{ChatMessage, Identity};
use crate::domain::state::{ConnectionState, StateError};
use crate::domain::timeline::ViewChange;
use crate::store::{MessageStore, StoreError};

use actor::{ChatActor, Command};

/// Reconciler tuning
///
/// [`ChatSession::spawn`] normalizes the values, so out-of-range settings are
/// clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatConfig {
    /// Messages per history page, 1..=100 like the history endpoint
    pub page_size: u32,
    /// Bound of the session's command mailbox
    pub mailbox_capacity: usize,
    /// Bound of each live channel member queue
    pub channel_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_MESSAGE_PAGE_SIZE,
            mailbox_capacity: 256,
            channel_capacity: 256,
        }
    }
}

impl ChatConfig {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self.normalized()
    }

    /// Clamp the page size to what the history endpoint serves and keep
    /// both queue bounds at least one.
    ///
    /// A page size above the server's cap would end pagination after the
    /// first short page; zero could never load anything.
    pub fn normalized(self) -> Self {
        Self {
            page_size: self.page_size.clamp(1, MAX_MESSAGE_PAGE_SIZE),
            mailbox_capacity: self.mailbox_capacity.max(1),
            channel_capacity: self.channel_capacity.max(1),
        }
    }

    /// In-process hub whose member queues hold `channel_capacity` events
    pub fn local_hub(&self) -> LocalChannelHub {
        LocalChannelHub::new(self.channel_capacity)
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message text must not be empty")]
    EmptyMessage,

    #[error("Conversation id must not be empty")]
    InvalidConversation,

    #[error("Chat is not connected (currently {0})")]
    NotConnected(ConnectionState),

    #[error("A history fetch is already in flight")]
    FetchInFlight,

    #[error("No older messages remain")]
    NoMoreHistory,

    #[error("The conversation changed before the request completed")]
    Superseded,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Chat session has shut down")]
    SessionClosed,
}

/// Everything a consumer needs to render a conversation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub conversation_id: Option<String>,
    /// Deduplicated, ascending by timestamp
    pub messages: Vec<ChatMessage>,
    pub connection: ConnectionState,
    /// Other participants present on the channel, sorted
    pub online_users: Vec<String>,
    /// A history fetch is in flight
    pub is_loading: bool,
    pub has_more: bool,
    /// What the latest update did to `messages`
    pub last_change: ViewChange,
}

type Reply<T> = oneshot::Sender<Result<T, ChatError>>;

/// Handle to a running chat session. Dropping every clone tears the session down.
#[derive(Debug, Clone)]
pub struct ChatSession {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ChatSnapshot>,
}

impl ChatSession {
    /// Start the session actor on the current tokio runtime.
    pub fn spawn(
        identity: Identity,
        store: Arc<dyn MessageStore>,
        channel: Arc<dyn LiveChannel>,
        config: ChatConfig,
    ) -> Self {
        let config = config.normalized();
        let (commands, mailbox) = mpsc::channel(config.mailbox_capacity);
        let (publisher, view) = watch::channel(ChatSnapshot::default());

        let actor = ChatActor::new(
            identity,
            store,
            channel,
            config,
            mailbox,
            commands.downgrade(),
            publisher,
        );
        tokio::spawn(actor.run());

        Self { commands, view }
    }

    /// Open a conversation: load the first page (unless skipped), join its
    /// channel and announce presence. Returns once connected; the first page
    /// lands asynchronously (watch `is_loading`).
    pub async fn initialize(
        &self,
        conversation_id: impl Into<String>,
        skip_initial_load: bool,
    ) -> Result<(), ChatError> {
        let conversation_id = conversation_id.into();
        if conversation_id.trim().is_empty() {
            return Err(ChatError::InvalidConversation);
        }
        self.request(|reply| Command::Initialize {
            conversation_id,
            skip_initial_load,
            reply,
        })
        .await
    }

    /// Load the next older page; resolves with the number of messages received.
    pub async fn fetch_older(&self) -> Result<usize, ChatError> {
        self.request(|reply| Command::FetchOlder { reply }).await
    }

    /// Send a message optimistically; resolves with the confirmed record.
    pub async fn send(&self, text: &str) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let text = text.to_string();
        self.request(|reply| Command::Send { text, reply }).await
    }

    /// Leave the current conversation and open another one.
    pub async fn switch_conversation(
        &self,
        conversation_id: impl Into<String>,
        skip_initial_load: bool,
    ) -> Result<(), ChatError> {
        let conversation_id = conversation_id.into();
        if conversation_id.trim().is_empty() {
            return Err(ChatError::InvalidConversation);
        }
        self.request(|reply| Command::Switch {
            conversation_id,
            skip_initial_load,
            reply,
        })
        .await
    }

    /// Announce leaving, drop the channel membership and reset to disconnected.
    pub async fn teardown(&self) -> Result<(), ChatError> {
        self.request(|reply| Command::Teardown { reply }).await
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ChatSnapshot> {
        self.view.clone()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, ChatError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ChatError::SessionClosed)?;
        response.await.map_err(|_| ChatError::SessionClosed)?
    }
}
