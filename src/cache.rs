//! Last published payload per channel
//!
//! Only tracked channels are recorded. The map sits behind one short-held
//! lock; readers get an owned copy so no lock outlives the call.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::registry::event::PREDICTIONS_CHANNEL;

/// Most recent payload for each tracked channel
#[derive(Debug)]
pub struct LastPublishedCache {
    tracked: HashSet<String>,
    entries: RwLock<HashMap<String, Value>>,
}

impl LastPublishedCache {
    /// Track only the `predictions` channel
    pub fn new() -> Self {
        Self::tracking([PREDICTIONS_CHANNEL])
    }

    /// Track the given channels
    pub fn tracking<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracked: channels.into_iter().map(Into::into).collect(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Whether publishes to this channel are recorded
    pub fn is_tracked(&self, channel: &str) -> bool {
        self.tracked.contains(channel)
    }

    /// Overwrite the entry for a tracked channel
    ///
    /// Returns `false` without recording if the channel isn't tracked.
    pub fn record(&self, channel: &str, payload: Value) -> bool {
        if !self.is_tracked(channel) {
            return false;
        }
        self.entries.write().insert(channel.to_string(), payload);
        true
    }

    pub fn get(&self, channel: &str) -> Option<Value> {
        self.entries.read().get(channel).cloned()
    }

    /// Copy of every recorded entry, keyed by channel name
    pub fn snapshot_all(&self) -> Map<String, Value> {
        self.entries
            .read()
            .iter()
            .map(|(channel, payload)| (channel.clone(), payload.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for LastPublishedCache {
    fn default() -> Self {
        Self::new()
    }
}
