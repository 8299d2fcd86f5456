//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jmake_store::StoreConfig;

/// Settings of one [`DependencyEngine`](crate::DependencyEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding every store and the symbol table.
    pub cache_dir: PathBuf,
    pub store: StoreConfig,
    /// Wall-clock budget for resolving source usages in one
    /// `find_dependent_classes` call. Past it, unresolved usages count as
    /// real.
    pub search_budget: Duration,
    /// Interface whose implementors are remote classes.
    pub remote_marker: String,
    /// Root of the class hierarchy.
    pub object_class: String,
}

impl EngineConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            store: StoreConfig::default(),
            search_budget: Duration::from_secs(5),
            remote_marker: "java.rmi.Remote".to_string(),
            object_class: "java.lang.Object".to_string(),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_search_budget(mut self, budget: Duration) -> Self {
        self.search_budget = budget;
        self
    }

    #[must_use]
    pub fn with_remote_marker(mut self, marker: impl Into<String>) -> Self {
        self.remote_marker = marker.into();
        self
    }

    #[must_use]
    pub fn with_object_class(mut self, name: impl Into<String>) -> Self {
        self.object_class = name.into();
        self
    }

    pub(crate) fn symbols_path(&self) -> PathBuf {
        self.cache_dir.join("symbols.bin")
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.cache_dir
    }
}
