//! Event types for channel routing
//!
//! This module defines the names that identify channels and the events that
//! are broadcast to their subscribers.

use std::sync::Arc;

use serde_json::Value;

/// Channel carrying prediction updates
pub const PREDICTIONS_CHANNEL: &str = "predictions";
/// Channel carrying subscriber notifications
pub const SUBS_CHANNEL: &str = "subs";
/// Channel carrying user responses to the active poll
pub const POLL_ANSWERS_CHANNEL: &str = "poll-answers";
/// Channel carrying newly created polls
pub const POLLS_CHANNEL: &str = "polls";

/// Channels every deployment serves and keeps alive
pub const WELL_KNOWN_CHANNELS: [&str; 4] = [
    PREDICTIONS_CHANNEL,
    SUBS_CHANNEL,
    POLL_ANSWERS_CHANNEL,
    POLLS_CHANNEL,
];

/// Payload carried by keepalive events
pub const KEEPALIVE_SENTINEL: &str = "\n\n";

const MAX_CHANNEL_NAME_LEN: usize = 128;

/// Check that a channel name is non-empty and made of `[A-Za-z0-9_.:-]`
pub fn is_valid_channel_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_CHANNEL_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
}

/// Kind of event, sent to clients as the SSE `event:` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A state change published through one of the publish routes
    Publish,
    /// No-op event that keeps idle connections open
    Keepalive,
}

impl EventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Publish => "publish",
            EventType::Keepalive => "keepalive",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event to be broadcast to subscribers
///
/// Cheap to clone: the payload sits behind an `Arc`, so fan-out to many
/// subscribers shares a single allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Type of event
    pub event_type: EventType,
    /// Target channel
    pub channel: Arc<str>,
    /// Structured payload
    pub payload: Arc<Value>,
}

impl Event {
    /// Create a publish event
    pub fn publish(channel: impl Into<Arc<str>>, payload: Value) -> Self {
        Self {
            event_type: EventType::Publish,
            channel: channel.into(),
            payload: Arc::new(payload),
        }
    }

    /// Create a keepalive event
    pub fn keepalive(channel: impl Into<Arc<str>>) -> Self {
        Self {
            event_type: EventType::Keepalive,
            channel: channel.into(),
            payload: Arc::new(Value::String(KEEPALIVE_SENTINEL.to_string())),
        }
    }

    /// Whether this is a keepalive
    pub fn is_keepalive(&self) -> bool {
        self.event_type == EventType::Keepalive
    }

    /// Serialize the payload for the SSE `data:` field
    pub fn data(&self) -> String {
        self.payload.to_string()
    }
}
