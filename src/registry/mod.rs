//! Channel registry for pub/sub routing
//!
//! The registry manages channels and the subscriptions attached to them.
//! Each subscription owns a bounded `tokio::sync::mpsc` queue; the
//! broadcaster fills it with `try_send` and the streaming connection drains
//! it, so a slow client only ever fills its own queue.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<ChannelRegistry>
//!                    ┌──────────────────────────┐
//!                    │ channels: HashMap<Name,  │
//!                    │   Channel {              │
//!                    │     subscribers,         │
//!                    │     delivery lock,       │
//!                    │   }                      │
//!                    │ >                        │
//!                    └────────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [Broadcaster]          [SubscriptionStream]    [SubscriptionStream]
//!   publish()              poll_next()             poll_next()
//!         │                       │                       │
//!         └──► snapshot() ──► try_send() ──► mpsc ──► SSE response
//! ```
//!
//! # Subscription lifecycle
//!
//! `Open -> Closing -> Closed`. The transition out of `Open` is a single
//! compare-and-swap, so a client disconnect racing a failed delivery
//! removes the subscription exactly once.

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod store;
pub mod subscription;

pub use channel::Channel;
pub use config::RegistryConfig;
pub use error::DeliveryError;
pub use event::{Event, EventType};
pub use store::ChannelRegistry;
pub use subscription::{Subscription, SubscriptionId, SubscriptionState, SubscriptionStream};
