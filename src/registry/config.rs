//! Registry configuration

/// Default number of events buffered per subscriber before it is dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for the channel registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Outbound queue capacity for each subscription
    ///
    /// A subscriber whose queue is full when an event arrives is considered
    /// too slow and is disconnected.
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the per-subscription queue capacity (minimum 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}
