//! Collector configuration

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_COLLECTION_INTERVAL, DEFAULT_INITIAL_CAPACITY};

/// Collector options
///
/// Missing fields take their defaults when deserialized, so an embedder's
/// config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Bytes allocated since the last collection before `should_collect` fires
    pub collection_interval: usize,

    /// Block slots reserved when the heap is created
    pub initial_capacity: usize,
}

impl GcConfig {
    /// Options with a different collection interval
    pub fn with_interval(mut self, bytes: usize) -> Self {
        self.collection_interval = bytes;
        self
    }

    /// Options with a different initial block capacity
    pub fn with_initial_capacity(mut self, blocks: usize) -> Self {
        self.initial_capacity = blocks;
        self
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            collection_interval: DEFAULT_COLLECTION_INTERVAL,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}
