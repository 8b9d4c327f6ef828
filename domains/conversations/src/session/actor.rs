//! Chat session actor

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::{ChatConfig, ChatError, ChatSnapshot, Reply};
use crate::channel::{channel_name, ChannelEnvelope, LiveChannel, LiveEvent, Subscription};
use crate::domain::entities::{ChatMessage, Identity, NewMessage, UserJoined, UserLeft};
use crate::domain::state::{ConnectionEvent, ConnectionState, ConnectionStateMachine};
use crate::domain::timeline::{MessageTimeline, ViewChange};
use crate::store::{MessageStore, PageRequest, StoreError};

#[derive(Debug)]
pub(super) enum Command {
    Initialize {
        conversation_id: String,
        skip_initial_load: bool,
        reply: Reply<()>,
    },
    FetchOlder {
        reply: Reply<usize>,
    },
    Send {
        text: String,
        reply: Reply<ChatMessage>,
    },
    Switch {
        conversation_id: String,
        skip_initial_load: bool,
        reply: Reply<()>,
    },
    Teardown {
        reply: Reply<()>,
    },
    /// Posted by a history fetch sub-task
    HistoryArrived {
        generation: u64,
        page: PageRequest,
        result: Result<Vec<ChatMessage>, StoreError>,
        reply: Option<Reply<usize>>,
    },
    /// Posted by a persist-and-broadcast sub-task
    SendSettled {
        generation: u64,
        provisional_id: String,
        result: Result<ChatMessage, ChatError>,
        reply: Reply<ChatMessage>,
    },
}

pub(super) struct ChatActor {
    identity: Identity,
    /// Channel member id, unique per session
    subscriber_id: String,
    store: Arc<dyn MessageStore>,
    channel: Arc<dyn LiveChannel>,
    config: ChatConfig,
    mailbox: mpsc::Receiver<Command>,
    /// Weak so that dropping every handle closes the mailbox
    loopback: mpsc::WeakSender<Command>,
    publisher: watch::Sender<ChatSnapshot>,

    conversation_id: Option<String>,
    connection: ConnectionState,
    timeline: MessageTimeline,
    presence: BTreeSet<String>,
    subscription: Option<Subscription>,
    pages_fetched: u32,
    has_more: bool,
    fetch_in_flight: bool,
    /// Bumped on teardown; sub-task results from an older generation are stale
    generation: u64,
}

impl ChatActor {
    pub(super) fn new(
        identity: Identity,
        store: Arc<dyn MessageStore>,
        channel: Arc<dyn LiveChannel>,
        config: ChatConfig,
        mailbox: mpsc::Receiver<Command>,
        loopback: mpsc::WeakSender<Command>,
        publisher: watch::Sender<ChatSnapshot>,
    ) -> Self {
        Self {
            identity,
            subscriber_id: Uuid::new_v4().to_string(),
            store,
            channel,
            config,
            mailbox,
            loopback,
            publisher,
            conversation_id: None,
            connection: ConnectionState::Disconnected,
            timeline: MessageTimeline::new(),
            presence: BTreeSet::new(),
            subscription: None,
            pages_fetched: 0,
            has_more: true,
            fetch_in_flight: false,
            generation: 0,
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.mailbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                envelope = next_envelope(&mut self.subscription) => match envelope {
                    Some(envelope) => self.on_envelope(envelope),
                    None => self.on_membership_dropped(),
                },
            }
        }

        self.teardown().await;
        tracing::debug!(user_id = %self.identity.user_id, "Chat session stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Initialize {
                conversation_id,
                skip_initial_load,
                reply,
            } => {
                let result = self.initialize(conversation_id, skip_initial_load).await;
                let _ = reply.send(result);
            }
            Command::FetchOlder { reply } => self.fetch_older(reply),
            Command::Send { text, reply } => self.send(text, reply),
            Command::Switch {
                conversation_id,
                skip_initial_load,
                reply,
            } => {
                self.teardown().await;
                let result = self.initialize(conversation_id, skip_initial_load).await;
                let _ = reply.send(result);
            }
            Command::Teardown { reply } => {
                self.teardown().await;
                let _ = reply.send(Ok(()));
            }
            Command::HistoryArrived {
                generation,
                page,
                result,
                reply,
            } => self.on_history(generation, page, result, reply),
            Command::SendSettled {
                generation,
                provisional_id,
                result,
                reply,
            } => self.on_send_settled(generation, provisional_id, result, reply),
        }
    }

    async fn initialize(
        &mut self,
        conversation_id: String,
        skip_initial_load: bool,
    ) -> Result<(), ChatError> {
        if conversation_id.trim().is_empty() {
            return Err(ChatError::InvalidConversation);
        }

        // A retry for a different conversation starts from scratch
        if self.connection == ConnectionState::Connecting
            && self.conversation_id.as_deref() != Some(conversation_id.as_str())
        {
            self.teardown().await;
        }

        let next = ConnectionStateMachine::transition(self.connection, ConnectionEvent::Activate)?;
        let retry = self.connection == ConnectionState::Connecting;
        self.connection = next;

        if !retry {
            tracing::info!(conversation_id = %conversation_id, "Opening conversation");
            self.conversation_id = Some(conversation_id.clone());
            self.pages_fetched = 0;
            self.has_more = true;
        }

        if !skip_initial_load && self.pages_fetched == 0 && !self.fetch_in_flight {
            let page = PageRequest::page(0, self.config.page_size)?;
            self.spawn_fetch(page, None);
        }
        self.publish(ViewChange::Unchanged);

        let channel = channel_name(&conversation_id);
        let subscription = match self.channel.subscribe(&channel, &self.subscriber_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Channel subscribe failed");
                return Err(e.into());
            }
        };

        let joined = UserJoined {
            user_id: self.identity.user_id.clone(),
            user_name: self.identity.display_name.clone(),
            timestamp: Utc::now(),
        };
        let announced = match ChannelEnvelope::user_joined(&joined) {
            Ok(envelope) => {
                self.channel
                    .broadcast(&channel, &self.subscriber_id, envelope)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = announced {
            tracing::warn!(channel = %channel, error = %e, "Failed to announce presence");
            if let Err(e) = self.channel.unsubscribe(subscription).await {
                tracing::debug!(error = %e, "Unsubscribe after failed join also failed");
            }
            return Err(e.into());
        }

        self.subscription = Some(subscription);
        self.connection =
            ConnectionStateMachine::transition(self.connection, ConnectionEvent::Subscribed)?;
        tracing::info!(channel = %channel, user_id = %self.identity.user_id, "Joined conversation channel");
        self.publish(ViewChange::Unchanged);
        Ok(())
    }

    fn fetch_older(&mut self, reply: Reply<usize>) {
        if self.conversation_id.is_none() {
            let _ = reply.send(Err(ChatError::NotConnected(self.connection)));
            return;
        }
        if self.fetch_in_flight {
            let _ = reply.send(Err(ChatError::FetchInFlight));
            return;
        }
        if !self.has_more {
            let _ = reply.send(Err(ChatError::NoMoreHistory));
            return;
        }

        match PageRequest::page(self.pages_fetched, self.config.page_size) {
            Ok(page) => {
                self.spawn_fetch(page, Some(reply));
                self.publish(ViewChange::Unchanged);
            }
            Err(e) => {
                let _ = reply.send(Err(e.into()));
            }
        }
    }

    fn spawn_fetch(&mut self, page: PageRequest, reply: Option<Reply<usize>>) {
        let (Some(mailbox), Some(conversation_id)) =
            (self.loopback.upgrade(), self.conversation_id.clone())
        else {
            return;
        };

        let store = Arc::clone(&self.store);
        let generation = self.generation;
        self.fetch_in_flight = true;

        tokio::spawn(async move {
            let result = store.fetch_page(&conversation_id, page).await;
            let _ = mailbox
                .send(Command::HistoryArrived {
                    generation,
                    page,
                    result,
                    reply,
                })
                .await;
        });
    }

    fn on_history(
        &mut self,
        generation: u64,
        page: PageRequest,
        result: Result<Vec<ChatMessage>, StoreError>,
        reply: Option<Reply<usize>>,
    ) {
        if generation != self.generation {
            tracing::debug!(offset = page.offset, "Discarding history page for a closed conversation");
            if let Some(reply) = reply {
                let _ = reply.send(Err(ChatError::Superseded));
            }
            return;
        }
        self.fetch_in_flight = false;

        let outcome = match result {
            Ok(messages) => {
                let received = messages.len();
                self.pages_fetched += 1;
                self.has_more = received >= page.limit as usize;
                let change = self.timeline.apply_history_page(messages);
                tracing::debug!(
                    conversation_id = ?self.conversation_id,
                    offset = page.offset,
                    received,
                    has_more = self.has_more,
                    "History page merged"
                );
                self.publish(change);
                Ok(received)
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = ?self.conversation_id,
                    offset = page.offset,
                    error = %e,
                    "History fetch failed"
                );
                self.publish(ViewChange::Unchanged);
                Err(e.into())
            }
        };

        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn send(&mut self, text: String, reply: Reply<ChatMessage>) {
        let text = text.trim().to_string();
        if text.is_empty() {
            let _ = reply.send(Err(ChatError::EmptyMessage));
            return;
        }
        let conversation_id = match (&self.conversation_id, self.connection.can_send()) {
            (Some(id), true) => id.clone(),
            _ => {
                let _ = reply.send(Err(ChatError::NotConnected(self.connection)));
                return;
            }
        };
        let Some(mailbox) = self.loopback.upgrade() else {
            let _ = reply.send(Err(ChatError::SessionClosed));
            return;
        };

        let provisional = ChatMessage {
            id: Uuid::new_v4().to_string(),
            text: text.clone(),
            sender_id: self.identity.user_id.clone(),
            sender_name: self.identity.display_name.clone(),
            timestamp: Utc::now(),
            conversation_id: conversation_id.clone(),
        };
        let provisional_id = provisional.id.clone();
        let change = self.timeline.insert_pending(provisional);
        self.publish(change);

        let store = Arc::clone(&self.store);
        let channel = Arc::clone(&self.channel);
        let subscriber_id = self.subscriber_id.clone();
        let display_name = self.identity.display_name.clone();
        let new_message = NewMessage {
            conversation_id,
            sender_id: self.identity.user_id.clone(),
            text,
        };
        let generation = self.generation;

        tokio::spawn(async move {
            let result = persist_and_broadcast(
                store.as_ref(),
                channel.as_ref(),
                &subscriber_id,
                &display_name,
                new_message,
            )
            .await;
            let _ = mailbox
                .send(Command::SendSettled {
                    generation,
                    provisional_id,
                    result,
                    reply,
                })
                .await;
        });
    }

    fn on_send_settled(
        &mut self,
        generation: u64,
        provisional_id: String,
        result: Result<ChatMessage, ChatError>,
        reply: Reply<ChatMessage>,
    ) {
        if generation != self.generation {
            // The timeline it belonged to is gone; the caller still learns the outcome
            let _ = reply.send(result);
            return;
        }

        match result {
            Ok(confirmed) => {
                let change = self.timeline.confirm(&provisional_id, confirmed.clone());
                self.publish(change);
                let _ = reply.send(Ok(confirmed));
            }
            Err(e) => {
                tracing::error!(
                    conversation_id = ?self.conversation_id,
                    provisional_id = %provisional_id,
                    error = %e,
                    "Send failed, retracting message"
                );
                let change = self.timeline.retract(&provisional_id);
                self.publish(change);
                let _ = reply.send(Err(e));
            }
        }
    }

    fn on_envelope(&mut self, envelope: ChannelEnvelope) {
        let event = match LiveEvent::decode(envelope) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    conversation_id = ?self.conversation_id,
                    error = %e,
                    "Dropping malformed live event"
                );
                return;
            }
        };

        match event {
            LiveEvent::NewMessage(message) => {
                if self.conversation_id.as_deref() != Some(message.conversation_id.as_str()) {
                    tracing::warn!(
                        message_id = %message.id,
                        message_conversation_id = %message.conversation_id,
                        "Dropping live message for another conversation"
                    );
                    return;
                }
                let change = self.timeline.apply_live(message);
                if change != ViewChange::Unchanged {
                    self.publish(change);
                }
            }
            LiveEvent::UserJoined(joined) => {
                tracing::debug!(user_id = %joined.user_id, user_name = %joined.user_name, "User joined the chat");
                if self.presence.insert(joined.user_id) {
                    self.publish(ViewChange::Unchanged);
                }
            }
            LiveEvent::UserLeft(left) => {
                tracing::debug!(user_id = %left.user_id, "User left the chat");
                if self.presence.remove(&left.user_id) {
                    self.publish(ViewChange::Unchanged);
                }
            }
            LiveEvent::Other(event) => {
                tracing::debug!(event = %event, "Ignoring unhandled live event");
            }
        }
    }

    /// The hub ended our membership: stay on the conversation but fall back to
    /// connecting, so sends are refused until `initialize` joins again.
    fn on_membership_dropped(&mut self) {
        tracing::warn!(
            conversation_id = ?self.conversation_id,
            "Live channel dropped this session's membership"
        );
        self.subscription = None;
        match ConnectionStateMachine::transition(self.connection, ConnectionEvent::Dropped) {
            Ok(next) => self.connection = next,
            Err(e) => tracing::warn!(error = %e, "Unexpected state after membership drop"),
        }
        self.presence.clear();
        self.publish(ViewChange::Unchanged);
    }

    async fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            if self.connection == ConnectionState::Connected {
                self.announce_leave(subscription.channel()).await;
            }
            if let Err(e) = self.channel.unsubscribe(subscription).await {
                tracing::warn!(error = %e, "Channel unsubscribe failed");
            }
        }

        if self.connection != ConnectionState::Disconnected {
            match ConnectionStateMachine::transition(self.connection, ConnectionEvent::Teardown) {
                Ok(next) => self.connection = next,
                Err(e) => tracing::warn!(error = %e, "Unexpected state during teardown"),
            }
            tracing::info!(conversation_id = ?self.conversation_id, "Left conversation");
        }

        self.generation += 1;
        self.conversation_id = None;
        self.presence.clear();
        self.pages_fetched = 0;
        self.has_more = true;
        self.fetch_in_flight = false;
        let change = self.timeline.clear();
        self.publish(change);
    }

    async fn announce_leave(&self, channel: &str) {
        let left = UserLeft {
            user_id: self.identity.user_id.clone(),
            timestamp: Utc::now(),
        };
        let result = match ChannelEnvelope::user_left(&left) {
            Ok(envelope) => {
                self.channel
                    .broadcast(channel, &self.subscriber_id, envelope)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(channel = %channel, error = %e, "Failed to announce leave");
        }
    }

    fn publish(&self, last_change: ViewChange) {
        self.publisher.send_replace(ChatSnapshot {
            conversation_id: self.conversation_id.clone(),
            messages: self.timeline.messages().to_vec(),
            connection: self.connection,
            online_users: self.presence.iter().cloned().collect(),
            is_loading: self.fetch_in_flight,
            has_more: self.has_more,
            last_change,
        });
    }
}

async fn next_envelope(subscription: &mut Option<Subscription>) -> Option<ChannelEnvelope> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

/// Persist, then broadcast the confirmed record to the other members.
async fn persist_and_broadcast(
    store: &dyn MessageStore,
    channel: &dyn LiveChannel,
    subscriber_id: &str,
    display_name: &str,
    message: NewMessage,
) -> Result<ChatMessage, ChatError> {
    let channel_name = channel_name(&message.conversation_id);
    let mut confirmed = store.create(message).await?;
    if confirmed.sender_name.is_empty() {
        confirmed.sender_name = display_name.to_string();
    }

    let envelope = ChannelEnvelope::new_message(&confirmed)?;
    let delivered = channel
        .broadcast(&channel_name, subscriber_id, envelope)
        .await?;
    tracing::debug!(message_id = %confirmed.id, delivered, "Message broadcast");
    Ok(confirmed)
}
