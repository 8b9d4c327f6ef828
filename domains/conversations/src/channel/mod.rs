//! Live channel: publish/subscribe for realtime chat events
//!
//! A conversation's events travel on the channel named `chat-{conversationId}`
//! as [`ChannelEnvelope`]s. Delivery is best-effort and at-most-once; nothing is
//! replayed to late subscribers.

pub mod local;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::entities::{ChatMessage, UserJoined, UserLeft};

pub use local::LocalChannelHub;

pub const NEW_MESSAGE_EVENT: &str = "new-message";
pub const USER_JOINED_EVENT: &str = "user-joined";
pub const USER_LEFT_EVENT: &str = "user-left";

/// Channel name for a conversation
pub fn channel_name(conversation_id: &str) -> String {
    format!("chat-{conversation_id}")
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to subscribe to {channel}: {reason}")]
    SubscribeFailed { channel: String, reason: String },

    #[error("Channel closed: {0}")]
    Closed(String),

    #[error("Failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One event on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEnvelope {
    pub event: String,
    pub payload: serde_json::Value,
}

impl ChannelEnvelope {
    pub fn new_message(message: &ChatMessage) -> Result<Self, ChannelError> {
        Self::encode(NEW_MESSAGE_EVENT, message)
    }

    pub fn user_joined(joined: &UserJoined) -> Result<Self, ChannelError> {
        Self::encode(USER_JOINED_EVENT, joined)
    }

    pub fn user_left(left: &UserLeft) -> Result<Self, ChannelError> {
        Self::encode(USER_LEFT_EVENT, left)
    }

    fn encode<T: Serialize>(event: &str, payload: &T) -> Result<Self, ChannelError> {
        Ok(Self {
            event: event.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// A decoded envelope
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    NewMessage(ChatMessage),
    UserJoined(UserJoined),
    UserLeft(UserLeft),
    /// An event name this client does not handle
    Other(String),
}

impl LiveEvent {
    /// Decode an envelope. Known events with malformed payloads are errors.
    pub fn decode(envelope: ChannelEnvelope) -> Result<Self, serde_json::Error> {
        Ok(match envelope.event.as_str() {
            NEW_MESSAGE_EVENT => Self::NewMessage(serde_json::from_value(envelope.payload)?),
            USER_JOINED_EVENT => Self::UserJoined(serde_json::from_value(envelope.payload)?),
            USER_LEFT_EVENT => Self::UserLeft(serde_json::from_value(envelope.payload)?),
            _ => Self::Other(envelope.event),
        })
    }
}

/// Receiving end of a channel membership. Hand it back to
/// [`LiveChannel::unsubscribe`] to leave.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    subscriber: String,
    token: u64,
    receiver: mpsc::Receiver<ChannelEnvelope>,
}

impl Subscription {
    pub fn new(
        channel: impl Into<String>,
        subscriber: impl Into<String>,
        token: u64,
        receiver: mpsc::Receiver<ChannelEnvelope>,
    ) -> Self {
        Self {
            channel: channel.into(),
            subscriber: subscriber.into(),
            token,
            receiver,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    /// Distinguishes repeated subscriptions of the same subscriber
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Next event, or `None` once the channel dropped this membership
    pub async fn recv(&mut self) -> Option<ChannelEnvelope> {
        self.receiver.recv().await
    }
}

/// Publish/subscribe transport keyed by channel name.
#[async_trait::async_trait]
pub trait LiveChannel: Send + Sync {
    /// Join `channel` as `subscriber`. Joining again replaces the earlier membership.
    async fn subscribe(&self, channel: &str, subscriber: &str)
        -> Result<Subscription, ChannelError>;

    /// Deliver to every other member of `channel`; returns how many received it.
    async fn broadcast(
        &self,
        channel: &str,
        sender: &str,
        envelope: ChannelEnvelope,
    ) -> Result<usize, ChannelError>;

    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), ChannelError>;
}
