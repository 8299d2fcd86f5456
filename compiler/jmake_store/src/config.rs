//! Store tuning knobs.

/// Configuration shared by all stores of one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Keys held in each set-valued store's write-back cache.
    pub set_cache_capacity: usize,
    /// Records held in each class-record cache.
    pub record_cache_capacity: usize,
    /// The protected segment holds `1 / protected_divisor` of a cache.
    pub protected_divisor: usize,
    /// Pending additions plus removals on one key before it is written out
    /// eagerly.
    pub batch_threshold: usize,
    /// Minimum append-log size before a sync may compact it into the
    /// snapshot.
    pub compaction_min_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            set_cache_capacity: 2048,
            record_cache_capacity: 1024,
            protected_divisor: 4,
            batch_threshold: 3000,
            compaction_min_bytes: 64 * 1024,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_set_cache_capacity(mut self, capacity: usize) -> Self {
        self.set_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_record_cache_capacity(mut self, capacity: usize) -> Self {
        self.record_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_protected_divisor(mut self, divisor: usize) -> Self {
        self.protected_divisor = divisor;
        self
    }

    #[must_use]
    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_compaction_min_bytes(mut self, bytes: u64) -> Self {
        self.compaction_min_bytes = bytes;
        self
    }

    /// Split a cache capacity into (probationary, protected) segment sizes.
    ///
    /// Both segments hold at least one entry.
    pub fn segments(&self, capacity: usize) -> (usize, usize) {
        let protected = (capacity / self.protected_divisor.max(1)).max(1);
        let probationary = capacity.saturating_sub(protected).max(1);
        (probationary, protected)
    }
}
