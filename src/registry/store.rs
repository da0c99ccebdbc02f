//! Channel registry implementation
//!
//! The central registry that owns every channel and its subscriber set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::stats::RelayStats;

use super::channel::Channel;
use super::config::RegistryConfig;
use super::subscription::{Subscription, SubscriptionId, SubscriptionStream};

/// Central registry for all channels
///
/// Channels are created lazily and live for the lifetime of the registry.
/// Read-heavy workloads (snapshots taken by every publish) only take the
/// outer read lock.
pub struct ChannelRegistry {
    /// Map of channel name to channel
    channels: RwLock<HashMap<Arc<str>, Arc<Channel>>>,

    /// Counter for subscription ids
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,

    stats: Arc<RelayStats>,
}

impl ChannelRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_stats(config, Arc::new(RelayStats::new()))
    }

    /// Create a new registry reporting into shared counters
    pub fn with_stats(config: RegistryConfig, stats: Arc<RelayStats>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            stats,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Return the channel, creating and registering it if needed
    pub fn get_or_create(&self, name: &str) -> Arc<Channel> {
        if let Some(channel) = self.channels.read().get(name) {
            return Arc::clone(channel);
        }

        let mut channels = self.channels.write();
        // Another caller may have created it between the two locks.
        if let Some(channel) = channels.get(name) {
            return Arc::clone(channel);
        }

        let key: Arc<str> = Arc::from(name);
        let channel = Arc::new(Channel::new(Arc::clone(&key), Arc::clone(&self.stats)));
        channels.insert(key, Arc::clone(&channel));

        tracing::debug!(channel = %name, "Channel created");
        channel
    }

    /// Look up a channel without creating it
    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().get(name).cloned()
    }

    /// Allocate a fresh subscription id
    pub fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Open a new subscription on a channel
    ///
    /// The returned stream yields every event published to the channel from
    /// now on. Dropping it unsubscribes.
    pub fn open(&self, name: &str) -> SubscriptionStream {
        let channel = self.get_or_create(name);
        let id = self.next_subscription_id();
        let (subscription, rx) =
            Subscription::new(id, Arc::from(channel.name()), self.config.queue_capacity);

        channel.add(Arc::clone(&subscription));
        self.stats.subscription_opened();

        tracing::info!(
            channel = %name,
            subscription = %id,
            subscribers = channel.subscriber_count(),
            "Subscriber added"
        );

        SubscriptionStream::new(rx, subscription, channel)
    }

    /// Add an existing subscription to a channel
    ///
    /// Idempotent: adding the same subscription twice returns `false` the
    /// second time.
    pub fn subscribe(&self, name: &str, subscription: Arc<Subscription>) -> bool {
        let added = self.get_or_create(name).add(subscription);
        if added {
            self.stats.subscription_opened();
        }
        added
    }

    /// Close and remove a subscription
    ///
    /// No-op returning `false` if it was already removed.
    pub fn unsubscribe(&self, name: &str, id: SubscriptionId) -> bool {
        let Some(channel) = self.get(name) else {
            return false;
        };
        let Some(subscription) = channel.get(id) else {
            return false;
        };
        channel.close_subscription(&subscription)
    }

    /// Point-in-time copy of a channel's subscribers
    pub fn snapshot(&self, name: &str) -> Vec<Arc<Subscription>> {
        self.get(name)
            .map(|channel| channel.snapshot())
            .unwrap_or_default()
    }

    /// Number of subscribers on a channel (0 if it doesn't exist)
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.get(name)
            .map(|channel| channel.subscriber_count())
            .unwrap_or(0)
    }

    /// Get total number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Names of every known channel, sorted
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .read()
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.sort();
        names
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::registry::event::Event;
    use crate::registry::subscription::SubscriptionState;

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let registry = ChannelRegistry::new();
        assert_eq!(registry.channel_count(), 0);
        assert!(registry.get("polls").is_none());

        let a = registry.get_or_create("polls");
        let b = registry.get_or_create("polls");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.channel_count(), 1);
    }

    #[test]
    fn test_snapshot_does_not_create() {
        let registry = ChannelRegistry::new();
        assert!(registry.snapshot("subs").is_empty());
        assert_eq!(registry.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_open_and_drop() {
        let registry = ChannelRegistry::new();

        let stream = registry.open("subs");
        assert_eq!(registry.subscriber_count("subs"), 1);
        let subscription = Arc::clone(stream.subscription());

        drop(stream);
        assert_eq!(registry.subscriber_count("subs"), 0);
        assert_eq!(subscription.state(), SubscriptionState::Closed);
        assert_eq!(registry.stats().snapshot().active_subscriptions, 0);
    }

    #[test]
    fn test_subscribe_idempotent() {
        let registry = ChannelRegistry::new();
        let (subscription, _rx) = Subscription::new(registry.next_subscription_id(), "polls", 4);

        assert!(registry.subscribe("polls", Arc::clone(&subscription)));
        assert!(!registry.subscribe("polls", Arc::clone(&subscription)));
        assert_eq!(registry.subscriber_count("polls"), 1);
    }

    #[test]
    fn test_subscribe_rejects_other_channel() {
        let registry = ChannelRegistry::new();
        let (subscription, _rx) = Subscription::new(registry.next_subscription_id(), "polls", 4);

        assert!(!registry.subscribe("subs", Arc::clone(&subscription)));
        assert_eq!(registry.subscriber_count("subs"), 0);
        assert!(registry.subscribe("polls", Arc::clone(&subscription)));

        // Once closed on its own channel, nothing is left behind anywhere.
        assert!(registry.unsubscribe("polls", subscription.id()));
        assert_eq!(registry.subscriber_count("polls"), 0);
        assert_eq!(registry.subscriber_count("subs"), 0);
        assert_eq!(registry.stats().snapshot().subscriptions_opened, 1);
    }

    #[test]
    fn test_unsubscribe_twice_is_noop() {
        let registry = ChannelRegistry::new();
        let stream = registry.open("polls");
        let id = stream.id();

        assert!(registry.unsubscribe("polls", id));
        assert!(!registry.unsubscribe("polls", id));
        assert!(!registry.unsubscribe("missing", id));

        // The stream's own close loses the race and removes nothing.
        drop(stream);
        assert_eq!(registry.subscriber_count("polls"), 0);
        assert_eq!(registry.stats().snapshot().active_subscriptions, 0);
    }

    #[test]
    fn test_closed_subscription_not_readded() {
        let registry = ChannelRegistry::new();
        let stream = registry.open("subs");
        let subscription = Arc::clone(stream.subscription());
        drop(stream);

        assert!(!registry.subscribe("subs", subscription));
        assert_eq!(registry.subscriber_count("subs"), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_stream() {
        let registry = ChannelRegistry::new();
        let mut stream = registry.open("polls");

        stream
            .subscription()
            .try_send(Event::publish("polls", json!({"n": 1})))
            .unwrap();
        registry.unsubscribe("polls", stream.id());

        // Queued events are still drained, then the stream ends.
        assert_eq!(*stream.recv().await.unwrap().payload, json!({"n": 1}));
        assert!(stream.recv().await.is_none());
    }

    #[test]
    fn test_unsubscribe_wakes_parked_stream() {
        let registry = ChannelRegistry::new();
        let mut stream = registry.open("polls");
        let id = stream.id();

        let mut next = tokio_test::task::spawn(stream.next());
        tokio_test::assert_pending!(next.poll());

        assert!(registry.unsubscribe("polls", id));
        assert!(next.is_woken());
        tokio_test::assert_ready_eq!(next.poll(), None);
    }

    #[test]
    fn test_channel_names_sorted() {
        let registry = ChannelRegistry::new();
        registry.get_or_create("subs");
        registry.get_or_create("polls");
        let _stream = registry.open("predictions");

        assert_eq!(registry.channel_names(), vec!["polls", "predictions", "subs"]);
    }
}
