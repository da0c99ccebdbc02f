//! HTTP surface of the relay
//!
//! A thin layer over the broadcast core: publish routes validate bodies and
//! hand events to the broadcaster, stream routes turn a subscription into a
//! Server-Sent Events response.

pub mod auth;
pub mod config;
pub mod listener;
pub mod routes;
pub mod state;

pub use auth::AuthError;
pub use config::ServerConfig;
pub use listener::RelayServer;
pub use routes::router;
pub use state::RelayState;
