//! Publish/subscribe relay over Server-Sent Events
//!
//! Authenticated HTTP POSTs describing state changes (predictions, subscriber
//! events, polls, poll answers) are rebroadcast to every client streaming the
//! matching channel.
//!
//! ```no_run
//! use relay_rs::{RelayServer, ServerConfig};
//!
//! # async fn example() -> relay_rs::error::Result<()> {
//! let config = ServerConfig::default().auth_token("secret");
//! let server = RelayServer::new(config);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod cache;
pub mod error;
pub mod keepalive;
pub mod payload;
pub mod registry;
pub mod server;
pub mod stats;

pub use broadcast::{Broadcaster, Publish, PublishReport};
pub use cache::LastPublishedCache;
pub use error::{Error, Result};
pub use keepalive::KeepAliveScheduler;
pub use registry::{ChannelRegistry, Event, EventType, RegistryConfig};
pub use server::{RelayServer, RelayState, ServerConfig};
