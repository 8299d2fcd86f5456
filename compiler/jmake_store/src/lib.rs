//! jmake store - persistence for the incremental dependency engine
//!
//! Every store is a named pair of files (snapshot plus append log) under the
//! engine's cache directory, fronted by a segmented-LRU write-back cache:
//!
//! - [`DependencySetStore`]: class id → set of class ids. Changes to keys that
//!   were never read are appended as delta frames instead of rewriting the
//!   whole set.
//! - [`BackDependencyStore`]: class id → set of [`ReferencerRecord`]s, the
//!   classes (and members) that use it.
//! - [`ClassRecordStore`]: class id → [`ClassRecord`], written back only when
//!   dirty.
//!
//! In-memory state may be newer than disk until `flush()` or `dispose()`.
//! Any I/O failure or undecodable value surfaces as [`CacheCorrupted`].
//!
//! [`ReferencerRecord`]: jmake_ir::ReferencerRecord
//! [`ClassRecord`]: jmake_ir::ClassRecord

mod codec;
mod config;
mod delta_store;
mod disk;
mod error;
mod record_store;
mod slru;

pub use codec::{DeltaElement, FrameError};
pub use config::StoreConfig;
pub use delta_store::{BackDependencyStore, DeltaSetStore, DependencySetStore};
pub use error::{CacheCorrupted, StoreResult};
pub use record_store::ClassRecordStore;
