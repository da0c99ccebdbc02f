//! Registry error types
//!
//! Errors raised while handing an event to a single subscriber. They never
//! leave the broadcaster: the affected subscription is closed and the
//! remaining subscribers are unaffected.

use super::subscription::SubscriptionId;

/// Error type for a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Subscriber's outbound queue is full
    QueueFull(SubscriptionId),
    /// Subscription is closing or closed, or its stream has gone away
    Closed(SubscriptionId),
}

impl DeliveryError {
    /// Subscription the failure belongs to
    pub fn subscription_id(&self) -> SubscriptionId {
        match self {
            DeliveryError::QueueFull(id) | DeliveryError::Closed(id) => *id,
        }
    }
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::QueueFull(id) => write!(f, "Subscriber queue full: {}", id),
            DeliveryError::Closed(id) => write!(f, "Subscription closed: {}", id),
        }
    }
}

impl std::error::Error for DeliveryError {}
