//! Event fan-out
//!
//! The broadcaster is the single entry point for delivering events: publish
//! routes and the keepalive task both go through [`Publish::publish`].

use std::sync::Arc;

use crate::cache::LastPublishedCache;
use crate::error::{Error, Result};
use crate::registry::event::{is_valid_channel_name, Event};
use crate::registry::{ChannelRegistry, DeliveryError};
use crate::stats::RelayStats;

/// Outcome of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the event was enqueued for
    pub delivered: usize,
    /// Subscribers skipped and disconnected
    pub dropped: usize,
}

/// Something events can be published through
pub trait Publish: Send + Sync + 'static {
    /// Deliver an event to every current subscriber of `channel`
    fn publish(&self, channel: &str, event: Event) -> Result<PublishReport>;
}

/// Delivers events to channel subscribers without waiting on any of them
pub struct Broadcaster {
    registry: Arc<ChannelRegistry>,
    cache: Arc<LastPublishedCache>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ChannelRegistry>, cache: Arc<LastPublishedCache>) -> Self {
        Self { registry, cache }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<LastPublishedCache> {
        &self.cache
    }

    fn stats(&self) -> &RelayStats {
        self.registry.stats()
    }
}

impl Publish for Broadcaster {
    fn publish(&self, channel_name: &str, event: Event) -> Result<PublishReport> {
        if !is_valid_channel_name(channel_name) {
            return Err(Error::InvalidChannel(channel_name.to_string()));
        }

        let keepalive = event.is_keepalive();
        self.stats().record_publish(keepalive);

        let channel = self.registry.get_or_create(channel_name);
        let mut report = PublishReport::default();

        {
            let _order = channel.lock_delivery();

            // Cache order must match delivery order.
            if !keepalive {
                self.cache
                    .record(channel_name, event.payload.as_ref().clone());
            }

            for subscription in channel.snapshot() {
                match subscription.try_send(event.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        // Another caller already owns this removal.
                        if !channel.close_subscription(&subscription) {
                            continue;
                        }
                        report.dropped += 1;
                        match e {
                            DeliveryError::QueueFull(_) => tracing::warn!(
                                channel = %channel_name,
                                subscription = %e.subscription_id(),
                                "Dropping slow subscriber"
                            ),
                            DeliveryError::Closed(_) => tracing::debug!(
                                channel = %channel_name,
                                subscription = %e.subscription_id(),
                                "Dropping closed subscriber"
                            ),
                        }
                    }
                }
            }
        }

        self.stats().record_delivered(report.delivered);
        self.stats().record_dropped(report.dropped);

        if !keepalive {
            tracing::debug!(
                channel = %channel_name,
                delivered = report.delivered,
                dropped = report.dropped,
                "Event published"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::{EventType, RegistryConfig, SubscriptionState};

    fn broadcaster_with_capacity(capacity: usize) -> Broadcaster {
        let registry = ChannelRegistry::with_config(RegistryConfig::default().queue_capacity(capacity));
        Broadcaster::new(Arc::new(registry), Arc::new(LastPublishedCache::new()))
    }

    #[test]
    fn test_publish_zero_subscribers() {
        let broadcaster = broadcaster_with_capacity(4);

        let report = broadcaster
            .publish("predictions", Event::publish("predictions", json!({"ended": false})))
            .unwrap();

        assert_eq!(report, PublishReport::default());
        assert_eq!(
            broadcaster.cache().get("predictions"),
            Some(json!({"ended": false}))
        );
        assert_eq!(broadcaster.registry().stats().snapshot().events_published, 1);
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let broadcaster = broadcaster_with_capacity(4);
        let result = broadcaster.publish("", Event::publish("", json!(1)));
        assert!(matches!(result, Err(Error::InvalidChannel(_))));
        assert!(broadcaster.cache().is_empty());
    }

    #[test]
    fn test_keepalive_not_recorded() {
        let broadcaster = broadcaster_with_capacity(4);
        broadcaster
            .publish("predictions", Event::keepalive("predictions"))
            .unwrap();
        assert!(broadcaster.cache().is_empty());
    }

    #[tokio::test]
    async fn test_fifo_per_subscriber() {
        let broadcaster = broadcaster_with_capacity(16);
        let mut first = broadcaster.registry().open("polls");
        let mut second = broadcaster.registry().open("polls");

        for i in 0..10 {
            let report = broadcaster
                .publish("polls", Event::publish("polls", json!(i)))
                .unwrap();
            assert_eq!(report.delivered, 2);
        }

        for stream in [&mut first, &mut second] {
            for i in 0..10 {
                let event = stream.recv().await.unwrap();
                assert_eq!(event.event_type, EventType::Publish);
                assert_eq!(*event.payload, json!(i));
            }
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_dropped_others_unaffected() {
        let broadcaster = broadcaster_with_capacity(2);
        let slow = broadcaster.registry().open("subs");
        let mut fast = broadcaster.registry().open("subs");
        let slow_sub = Arc::clone(slow.subscription());

        for i in 0..2 {
            broadcaster
                .publish("subs", Event::publish("subs", json!(i)))
                .unwrap();
            assert_eq!(*fast.recv().await.unwrap().payload, json!(i));
        }

        // The slow subscriber's queue is now full.
        let report = broadcaster
            .publish("subs", Event::publish("subs", json!(2)))
            .unwrap();
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert_eq!(slow_sub.state(), SubscriptionState::Closed);
        assert_eq!(broadcaster.registry().subscriber_count("subs"), 1);
        assert_eq!(*fast.recv().await.unwrap().payload, json!(2));

        // Later events only reach the remaining subscriber.
        let report = broadcaster
            .publish("subs", Event::publish("subs", json!(3)))
            .unwrap();
        assert_eq!(report, PublishReport { delivered: 1, dropped: 0 });
        assert_eq!(*fast.recv().await.unwrap().payload, json!(3));

        drop(slow);
        assert_eq!(broadcaster.registry().stats().snapshot().subscribers_dropped, 1);
    }

    #[test]
    fn test_closing_subscriber_not_counted_as_dropped() {
        let broadcaster = broadcaster_with_capacity(4);
        let stream = broadcaster.registry().open("subs");

        // A close already in flight owns the removal.
        assert!(stream.subscription().begin_close());

        for i in 0..3 {
            let report = broadcaster
                .publish("subs", Event::publish("subs", json!(i)))
                .unwrap();
            assert_eq!(report, PublishReport::default());
        }
        assert_eq!(broadcaster.registry().stats().snapshot().subscribers_dropped, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cache_matches_last_delivered() {
        let broadcaster = Arc::new(broadcaster_with_capacity(1024));
        let mut stream = broadcaster.registry().open("predictions");

        let publishers: Vec<_> = (0..4)
            .map(|worker| {
                let broadcaster = Arc::clone(&broadcaster);
                tokio::spawn(async move {
                    for i in 0..100 {
                        broadcaster
                            .publish(
                                "predictions",
                                Event::publish("predictions", json!({"worker": worker, "i": i})),
                            )
                            .unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for publisher in publishers {
            publisher.await.unwrap();
        }

        let mut last = None;
        while let Some(event) = stream.try_recv() {
            last = Some(event.payload.as_ref().clone());
        }
        assert!(last.is_some());
        assert_eq!(broadcaster.cache().get("predictions"), last);
    }

    #[tokio::test]
    async fn test_channels_isolated() {
        let broadcaster = broadcaster_with_capacity(4);
        let mut polls = broadcaster.registry().open("polls");
        let mut subs = broadcaster.registry().open("subs");

        broadcaster
            .publish("polls", Event::publish("polls", json!("p")))
            .unwrap();

        assert_eq!(*polls.recv().await.unwrap().payload, json!("p"));
        assert!(subs.try_recv().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_disconnect_during_publish() {
        let broadcaster = Arc::new(broadcaster_with_capacity(1024));
        let mut keeper = broadcaster.registry().open("polls");

        let publisher = {
            let broadcaster = Arc::clone(&broadcaster);
            tokio::spawn(async move {
                for i in 0..500 {
                    broadcaster
                        .publish("polls", Event::publish("polls", json!(i)))
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let churn = {
            let broadcaster = Arc::clone(&broadcaster);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let stream = broadcaster.registry().open("polls");
                    let id = stream.id();
                    tokio::task::yield_now().await;
                    broadcaster.registry().unsubscribe("polls", id);
                    drop(stream);
                }
            })
        };

        publisher.await.unwrap();
        churn.await.unwrap();

        assert_eq!(broadcaster.registry().subscriber_count("polls"), 1);
        let stats = broadcaster.registry().stats().snapshot();
        assert_eq!(stats.subscriptions_opened, 201);
        assert_eq!(stats.active_subscriptions, 1);

        for i in 0..500 {
            assert_eq!(*keeper.recv().await.unwrap().payload, json!(i));
        }
    }
}
