//! Collection trigger
//!
//! The trigger is a plain byte counter: every allocation adds its size, every
//! collection resets it to zero, and a collection is due once the counter
//! reaches the configured interval. The collector never starts a cycle on its
//! own; the runtime polls [`CollectionTrigger::should_collect`] at safe points.

/// Allocation byte counter compared against a collection interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CollectionTrigger {
    next_collection: usize,
    interval: usize,
}

impl CollectionTrigger {
    pub fn new(interval: usize) -> Self {
        Self {
            next_collection: 0,
            interval,
        }
    }

    /// Count `bytes` toward the next collection
    #[inline]
    pub fn record_allocation(&mut self, bytes: usize) {
        self.next_collection = self.next_collection.saturating_add(bytes);
    }

    #[inline]
    pub fn should_collect(&self) -> bool {
        self.next_collection >= self.interval
    }

    /// Start counting from zero again
    #[inline]
    pub fn reset(&mut self) {
        self.next_collection = 0;
    }

    #[inline]
    pub fn pending_bytes(&self) -> usize {
        self.next_collection
    }

    #[inline]
    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn set_interval(&mut self, interval: usize) {
        self.interval = interval;
    }
}
