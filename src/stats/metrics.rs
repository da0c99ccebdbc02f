//! Statistics and metrics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Server-wide counters, shared by the registry and the broadcaster
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    events_published: AtomicU64,
    keepalives_sent: AtomicU64,
    events_delivered: AtomicU64,
    subscribers_dropped: AtomicU64,
    subscriptions_opened: AtomicU64,
    subscriptions_closed: AtomicU64,
}

impl RelayStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            events_published: AtomicU64::new(0),
            keepalives_sent: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
            subscriptions_opened: AtomicU64::new(0),
            subscriptions_closed: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_publish(&self, keepalive: bool) {
        if keepalive {
            self.keepalives_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_published.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_delivered(&self, count: usize) {
        self.events_delivered
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: usize) {
        self.subscribers_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn subscription_opened(&self) {
        self.subscriptions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn subscription_closed(&self) {
        self.subscriptions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let opened = self.subscriptions_opened.load(Ordering::Relaxed);
        let closed = self.subscriptions_closed.load(Ordering::Relaxed);

        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            events_published: self.events_published.load(Ordering::Relaxed),
            keepalives_sent: self.keepalives_sent.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            subscriptions_opened: opened,
            active_subscriptions: opened.saturating_sub(closed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of [`RelayStats`] at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the counters were created
    pub uptime: Duration,
    /// Publish events accepted (keepalives excluded)
    pub events_published: u64,
    /// Keepalive events broadcast
    pub keepalives_sent: u64,
    /// Individual enqueues that succeeded
    pub events_delivered: u64,
    /// Subscribers removed because a delivery failed
    pub subscribers_dropped: u64,
    /// Subscriptions ever opened
    pub subscriptions_opened: u64,
    /// Subscriptions currently open
    pub active_subscriptions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let snapshot = RelayStats::new().snapshot();
        assert_eq!(snapshot.events_published, 0);
        assert_eq!(snapshot.keepalives_sent, 0);
        assert_eq!(snapshot.events_delivered, 0);
        assert_eq!(snapshot.subscribers_dropped, 0);
        assert_eq!(snapshot.active_subscriptions, 0);
    }

    #[test]
    fn test_publish_counters_split_keepalives() {
        let stats = RelayStats::new();
        stats.record_publish(false);
        stats.record_publish(true);
        stats.record_publish(true);
        stats.record_delivered(5);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events_published, 1);
        assert_eq!(snapshot.keepalives_sent, 2);
        assert_eq!(snapshot.events_delivered, 5);
    }

    #[test]
    fn test_active_subscriptions() {
        let stats = RelayStats::new();
        stats.subscription_opened();
        stats.subscription_opened();
        stats.subscription_closed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.subscriptions_opened, 2);
        assert_eq!(snapshot.active_subscriptions, 1);
    }
}
