//! In-process live channel hub
//!
//! Each member of a channel owns a bounded mpsc queue. A broadcast is copied
//! into every other member's queue with `try_send`; a full or closed queue
//! loses the event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};

use super::{ChannelEnvelope, ChannelError, LiveChannel, Subscription};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug)]
struct Member {
    token: u64,
    sender: mpsc::Sender<ChannelEnvelope>,
}

type Channels = HashMap<String, HashMap<String, Member>>;

#[derive(Debug, Clone)]
pub struct LocalChannelHub {
    channels: Arc<Mutex<Channels>>,
    capacity: usize,
    next_token: Arc<AtomicU64>,
    fail_subscribes: Arc<AtomicBool>,
    fail_broadcasts: Arc<AtomicBool>,
}

impl Default for LocalChannelHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LocalChannelHub {
    /// `capacity` bounds each member's queue
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
            next_token: Arc::new(AtomicU64::new(1)),
            fail_subscribes: Arc::new(AtomicBool::new(false)),
            fail_broadcasts: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make subsequent subscribes fail, simulating an unreachable transport
    pub fn set_subscribe_failure(&self, fail: bool) {
        self.fail_subscribes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent broadcasts fail
    pub fn set_broadcast_failure(&self, fail: bool) {
        self.fail_broadcasts.store(fail, Ordering::SeqCst);
    }

    /// End every membership of `channel`; members see their subscription close.
    /// Returns how many were removed.
    pub fn close_channel(&self, channel: &str) -> usize {
        let removed = self.lock().remove(channel).map_or(0, |members| members.len());
        if removed > 0 {
            tracing::info!(channel, removed, "Closed channel");
        }
        removed
    }

    pub fn member_count(&self, channel: &str) -> usize {
        self.lock().get(channel).map_or(0, HashMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl LiveChannel for LocalChannelHub {
    async fn subscribe(
        &self,
        channel: &str,
        subscriber: &str,
    ) -> Result<Subscription, ChannelError> {
        if self.fail_subscribes.load(Ordering::SeqCst) {
            return Err(ChannelError::SubscribeFailed {
                channel: channel.to_string(),
                reason: "hub configured to refuse subscriptions".to_string(),
            });
        }

        let (sender, receiver) = mpsc::channel(self.capacity);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let replaced = self
            .lock()
            .entry(channel.to_string())
            .or_default()
            .insert(subscriber.to_string(), Member { token, sender });
        if replaced.is_some() {
            tracing::debug!(channel, subscriber, "Replaced existing channel membership");
        }

        tracing::debug!(channel, subscriber, "Subscribed to channel");
        Ok(Subscription::new(channel, subscriber, token, receiver))
    }

    async fn broadcast(
        &self,
        channel: &str,
        sender: &str,
        envelope: ChannelEnvelope,
    ) -> Result<usize, ChannelError> {
        if self.fail_broadcasts.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed(format!(
                "hub configured to refuse broadcasts on {channel}"
            )));
        }

        let channels = self.lock();
        let members = channels
            .get(channel)
            .filter(|members| members.contains_key(sender))
            .ok_or_else(|| ChannelError::Closed(format!("{sender} is not a member of {channel}")))?;

        let mut delivered = 0;
        for (subscriber, member) in members.iter().filter(|(id, _)| id.as_str() != sender) {
            match member.sender.try_send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(channel, subscriber = %subscriber, event = %envelope.event,
                        "Subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(channel, subscriber = %subscriber, "Subscriber gone, event dropped");
                }
            }
        }

        Ok(delivered)
    }

    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), ChannelError> {
        let mut channels = self.lock();
        let Some(members) = channels.get_mut(subscription.channel()) else {
            return Ok(());
        };

        // A newer subscription of the same subscriber stays in place
        if members
            .get(subscription.subscriber())
            .is_some_and(|member| member.token == subscription.token())
        {
            members.remove(subscription.subscriber());
            tracing::debug!(
                channel = subscription.channel(),
                subscriber = subscription.subscriber(),
                "Unsubscribed from channel"
            );
        }
        if members.is_empty() {
            channels.remove(subscription.channel());
        }
        Ok(())
    }
}
