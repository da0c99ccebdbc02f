//! Process-wide relay state
//!
//! Built once at startup and shared by `Arc` with request handlers and the
//! keepalive task. Nothing needs tearing down beyond dropping it.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::broadcast::Broadcaster;
use crate::cache::LastPublishedCache;
use crate::keepalive::KeepAliveScheduler;
use crate::registry::ChannelRegistry;
use crate::server::config::ServerConfig;
use crate::stats::RelayStats;

/// Everything the HTTP layer and the keepalive task share
pub struct RelayState {
    pub config: ServerConfig,
    pub registry: Arc<ChannelRegistry>,
    pub cache: Arc<LastPublishedCache>,
    pub broadcaster: Arc<Broadcaster>,
    pub(crate) stream_permits: Option<Arc<Semaphore>>,
}

impl RelayState {
    pub fn new(config: ServerConfig) -> Self {
        let stats = Arc::new(RelayStats::new());
        let registry = Arc::new(ChannelRegistry::with_stats(config.registry_config(), stats));
        let cache = Arc::new(LastPublishedCache::tracking(config.tracked_channels.iter().cloned()));
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry), Arc::clone(&cache)));

        let stream_permits = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry,
            cache,
            broadcaster,
            stream_permits,
        }
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        self.registry.stats()
    }

    /// Keepalive scheduler for the configured channels
    pub fn keepalive_scheduler(&self) -> KeepAliveScheduler {
        KeepAliveScheduler::new(
            self.broadcaster.clone(),
            self.config.well_known_channels.iter().cloned(),
            self.config.keepalive_interval,
        )
        .with_stats(Arc::clone(self.stats()))
    }
}
