//! Periodic keepalive events
//!
//! Proxies and browsers close SSE connections that stay silent for too long.
//! The scheduler publishes a no-op `keepalive` event to every well-known
//! channel on a fixed interval, through the same entry point as regular
//! publishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::broadcast::Publish;
use crate::registry::event::Event;
use crate::stats::RelayStats;

/// Default time between keepalive ticks
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Channels a keepalive was published to
    pub published: usize,
    /// Channels whose publish failed
    pub failed: usize,
}

/// Repeating task injecting keepalives into a fixed set of channels
pub struct KeepAliveScheduler {
    publisher: Arc<dyn Publish>,
    channels: Vec<String>,
    interval: Duration,
    stats: Option<Arc<RelayStats>>,
}

impl KeepAliveScheduler {
    pub fn new<I, S>(publisher: Arc<dyn Publish>, channels: I, interval: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            publisher,
            channels: channels.into_iter().map(Into::into).collect(),
            interval,
            stats: None,
        }
    }

    /// Log these counters after every tick
    pub fn with_stats(mut self, stats: Arc<RelayStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Publish one keepalive to each channel
    ///
    /// A failure on one channel does not stop the others.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for channel in &self.channels {
            match self
                .publisher
                .publish(channel, Event::keepalive(channel.as_str()))
            {
                Ok(_) => report.published += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(channel = %channel, error = %e, "Keepalive publish failed");
                }
            }
        }

        if let Some(ref stats) = self.stats {
            let snapshot = stats.snapshot();
            tracing::debug!(
                subscriptions = snapshot.active_subscriptions,
                published = snapshot.events_published,
                dropped = snapshot.subscribers_dropped,
                "Keepalive tick"
            );
        }

        report
    }

    /// Spawn the repeating task
    ///
    /// The first tick fires one interval after spawning. Abort the returned
    /// handle to stop it.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                self.tick();
            }
        })
    }
}
