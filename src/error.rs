//! Error types for the relay
//!
//! Delivery-path failures never surface here: they are contained inside the
//! broadcaster (see [`crate::registry::DeliveryError`]). Only request-facing
//! and startup failures are represented.

use thiserror::Error;

use crate::payload::ValidationError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (binding the listener, serving connections)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel name rejected before any lookup took place
    #[error("Invalid channel name: {0:?}")]
    InvalidChannel(String),

    /// Publish request body failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration value could not be parsed
    #[error("Invalid configuration for {key}: {reason}")]
    Config { key: &'static str, reason: String },
}
