//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::keepalive::DEFAULT_KEEPALIVE_INTERVAL;
use crate::registry::config::DEFAULT_QUEUE_CAPACITY;
use crate::registry::event::{PREDICTIONS_CHANNEL, WELL_KNOWN_CHANNELS};
use crate::registry::RegistryConfig;

/// Environment variable holding the bind address
pub const ENV_BIND_ADDR: &str = "RELAY_BIND_ADDR";
/// Environment variable holding the publish token
pub const ENV_AUTH_TOKEN: &str = "RELAY_AUTH_TOKEN";
/// Environment variable holding the keepalive interval in seconds
pub const ENV_KEEPALIVE_SECS: &str = "RELAY_KEEPALIVE_SECS";
/// Environment variable holding the per-subscriber queue capacity
pub const ENV_QUEUE_CAPACITY: &str = "RELAY_QUEUE_CAPACITY";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Bearer token required by the publish routes
    ///
    /// `None` rejects every publish request.
    pub auth_token: Option<String>,

    /// Time between keepalive events
    pub keepalive_interval: Duration,

    /// Channels that receive keepalives
    pub well_known_channels: Vec<String>,

    /// Channels whose last payload is served on `GET /`
    pub tracked_channels: Vec<String>,

    /// Per-subscriber outbound queue capacity
    pub queue_capacity: usize,

    /// Maximum concurrent stream connections (0 = unlimited)
    pub max_connections: usize,

    /// Allow stream requests from any origin
    pub cors_allow_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            auth_token: None,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            well_known_channels: WELL_KNOWN_CHANNELS.iter().map(|c| c.to_string()).collect(),
            tracked_channels: vec![PREDICTIONS_CHANNEL.to_string()],
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_connections: 0, // Unlimited
            cors_allow_any_origin: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Build a config from `RELAY_*` environment variables
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = addr.trim().parse().map_err(|e| Error::Config {
                key: ENV_BIND_ADDR,
                reason: format!("{}", e),
            })?;
        }

        if let Some(token) = lookup(ENV_AUTH_TOKEN) {
            config = config.auth_token(token);
        }

        if let Some(secs) = lookup(ENV_KEEPALIVE_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| Error::Config {
                key: ENV_KEEPALIVE_SECS,
                reason: format!("{}", e),
            })?;
            if secs == 0 {
                return Err(Error::Config {
                    key: ENV_KEEPALIVE_SECS,
                    reason: "must be greater than zero".into(),
                });
            }
            config.keepalive_interval = Duration::from_secs(secs);
        }

        if let Some(capacity) = lookup(ENV_QUEUE_CAPACITY) {
            let capacity: usize = capacity.trim().parse().map_err(|e| Error::Config {
                key: ENV_QUEUE_CAPACITY,
                reason: format!("{}", e),
            })?;
            config = config.queue_capacity(capacity);
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the publish token (empty disables publishing)
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.auth_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    /// Set keepalive interval
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the per-subscriber queue capacity (minimum 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set maximum stream connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set channels whose last payload is retained
    pub fn tracked_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Disable the permissive CORS policy on stream routes
    pub fn disable_cors(mut self) -> Self {
        self.cors_allow_any_origin = false;
        self
    }

    /// Registry settings derived from this config
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default().queue_capacity(self.queue_capacity)
    }
}
