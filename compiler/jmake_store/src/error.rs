//! The single failure mode of the persistent stores.

use std::io;
use std::path::{Path, PathBuf};

use jmake_ir::SymbolError;
use thiserror::Error;

/// A store could not be read or written, or its contents are not what was
/// written. The only recovery is wiping the cache and rebuilding.
#[derive(Debug, Error)]
pub enum CacheCorrupted {
    #[error("cache I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store '{store}' is corrupted: {detail}")]
    Malformed { store: String, detail: String },

    #[error("store '{store}' holds an undecodable record: {source}")]
    Codec {
        store: String,
        #[source]
        source: bincode::Error,
    },

    #[error(transparent)]
    Symbols(#[from] SymbolError),
}

impl CacheCorrupted {
    pub fn io(path: &Path, source: io::Error) -> Self {
        CacheCorrupted::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(store: &str, detail: impl Into<String>) -> Self {
        CacheCorrupted::Malformed {
            store: store.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn codec(store: &str, source: bincode::Error) -> Self {
        CacheCorrupted::Codec {
            store: store.to_string(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, CacheCorrupted>;
