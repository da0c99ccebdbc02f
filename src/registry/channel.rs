//! Per-channel state
//!
//! This module defines the subscriber set stored in the registry for each
//! channel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::stats::RelayStats;

use super::subscription::{Subscription, SubscriptionId};

/// Entry for a single channel in the registry
pub struct Channel {
    name: Arc<str>,

    /// Current subscribers; only mutated under the write lock
    subscribers: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,

    /// Serializes fan-out so every subscriber sees publishes in call order
    delivery: Mutex<()>,

    stats: Arc<RelayStats>,
}

impl Channel {
    pub(super) fn new(name: Arc<str>, stats: Arc<RelayStats>) -> Self {
        Self {
            name,
            subscribers: RwLock::new(HashMap::new()),
            delivery: Mutex::new(()),
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Add a subscription
    ///
    /// Returns `false` if it was already present, is no longer open, or is
    /// bound to another channel.
    pub fn add(&self, subscription: Arc<Subscription>) -> bool {
        if !subscription.is_open() || subscription.channel() != &*self.name {
            return false;
        }

        let mut subscribers = self.subscribers.write();
        if subscribers.contains_key(&subscription.id()) {
            return false;
        }
        subscribers.insert(subscription.id(), subscription);
        true
    }

    /// Look up a subscription by id
    pub fn get(&self, id: SubscriptionId) -> Option<Arc<Subscription>> {
        self.subscribers.read().get(&id).cloned()
    }

    /// Point-in-time copy of the subscriber set
    pub fn snapshot(&self) -> Vec<Arc<Subscription>> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Close a subscription and remove it from this channel
    ///
    /// Safe to race from the stream side and the broadcaster side: only the
    /// caller that wins the `Open -> Closing` transition removes the entry.
    pub fn close_subscription(&self, subscription: &Subscription) -> bool {
        if !subscription.begin_close() {
            return false;
        }

        let removed = self
            .subscribers
            .write()
            .remove(&subscription.id())
            .is_some();
        subscription.mark_closed();

        if removed {
            self.stats.subscription_closed();
            tracing::debug!(
                channel = %self.name,
                subscription = %subscription.id(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Hold the fan-out lock for this channel
    ///
    /// Must only be held while enqueueing; enqueues never wait.
    pub(crate) fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

