//! Persistent integer-keyed sets with write-back caching.
//!
//! Each cached key holds the additions and removals made since it was last
//! persisted. Until a read forces reconciliation with disk the store never
//! loads the old value: evicting an unreconciled entry appends its pending
//! changes as delta frames. A reconciled, dirty entry is rewritten in full,
//! which collapses the frames accumulated so far.

use std::path::Path;

use jmake_ir::{ClassId, Dependency, ReferencerRecord, Symbol};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::codec::{encode_base, encode_delta, replay, DeltaElement, FrameError};
use crate::config::StoreConfig;
use crate::disk::LogStore;
use crate::error::{CacheCorrupted, StoreResult};
use crate::slru::SegmentedLru;

struct Entry<T> {
    added: FxHashSet<T>,
    removed: FxHashSet<T>,
    /// Full value, once reconciled with disk.
    value: Option<FxHashSet<T>>,
    dirty: bool,
}

impl<T> Entry<T> {
    fn new() -> Self {
        Entry {
            added: FxHashSet::default(),
            removed: FxHashSet::default(),
            value: None,
            dirty: false,
        }
    }

    fn pending(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

struct Inner<T> {
    disk: LogStore,
    cache: SegmentedLru<u32, Entry<T>>,
    /// Keys whose persisted value carries delta frames.
    needs_compaction: FxHashSet<u32>,
    batch_threshold: usize,
}

/// Persistent map from a class id to a set of `T`.
pub struct DeltaSetStore<T: DeltaElement> {
    inner: Mutex<Inner<T>>,
}

/// Referenced classes of a class, or subclasses of a class.
pub type DependencySetStore = DeltaSetStore<Symbol>;

impl<T: DeltaElement> DeltaSetStore<T> {
    pub fn open(dir: &Path, name: &str, config: &StoreConfig) -> StoreResult<Self> {
        let (probationary, protected) = config.segments(config.set_cache_capacity);
        Ok(DeltaSetStore {
            inner: Mutex::new(Inner {
                disk: LogStore::open(dir, name, config.compaction_min_bytes)?,
                cache: SegmentedLru::new(probationary, protected),
                needs_compaction: FxHashSet::default(),
                batch_threshold: config.batch_threshold,
            }),
        })
    }

    pub fn add(&self, key: Symbol, value: T) -> StoreResult<()> {
        self.inner.lock().modify(key.raw(), |entry| {
            if let Some(set) = &mut entry.value {
                set.insert(value)
            } else {
                entry.removed.remove(&value);
                entry.added.insert(value);
                true
            }
        })
    }

    pub fn remove(&self, key: Symbol, value: T) -> StoreResult<()> {
        self.inner.lock().modify(key.raw(), |entry| {
            if let Some(set) = &mut entry.value {
                set.remove(&value)
            } else {
                entry.added.remove(&value);
                entry.removed.insert(value);
                true
            }
        })
    }

    /// Current set for `key`; empty if the key has no value.
    pub fn get_all(&self, key: Symbol) -> StoreResult<FxHashSet<T>> {
        self.inner.lock().reconciled(key.raw())
    }

    pub fn remove_key(&self, key: Symbol) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let key = key.raw();
        inner.cache.remove(&key);
        inner.needs_compaction.remove(&key);
        inner.disk.remove(key)
    }

    /// Write every cached change and sync to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.inner.lock().flush()
    }

    /// Flush, then close the underlying files.
    pub fn dispose(self) -> StoreResult<()> {
        self.inner.into_inner().flush()
    }

    /// Drop all keys, cached and persisted.
    pub fn clear(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.cache.clear();
        inner.needs_compaction.clear();
        inner.disk.clear()
    }
}

impl<T: DeltaElement> Inner<T> {
    fn frame_error(&self, error: &FrameError) -> CacheCorrupted {
        CacheCorrupted::malformed(self.disk.name(), error.to_string())
    }

    /// Cached entry for `key`, inserting an empty one if needed.
    fn entry(&mut self, key: u32) -> StoreResult<&mut Entry<T>> {
        if !self.cache.touch(&key) {
            if let Some((evicted_key, evicted)) = self.cache.insert(key, Entry::new()) {
                self.persist(evicted_key, evicted)?;
            }
        }
        self.cached(key)
    }

    fn cached(&mut self, key: u32) -> StoreResult<&mut Entry<T>> {
        let Inner { cache, disk, .. } = self;
        cache
            .peek_mut(&key)
            .ok_or_else(|| CacheCorrupted::malformed(disk.name(), format!("key {key} is not cached")))
    }

    fn modify(&mut self, key: u32, change: impl FnOnce(&mut Entry<T>) -> bool) -> StoreResult<()> {
        let threshold = self.batch_threshold;
        let entry = self.entry(key)?;
        if change(&mut *entry) {
            entry.dirty = true;
        }
        if entry.value.is_none() && entry.pending() > threshold {
            let added = std::mem::take(&mut entry.added);
            let removed = std::mem::take(&mut entry.removed);
            entry.dirty = false;
            trace!(store = self.disk.name(), key, pending = added.len() + removed.len(), "batch flush");
            self.write_unreconciled(key, &added, &removed)?;
        }
        Ok(())
    }

    /// Persisted set for `key`, noting whether it carries delta frames.
    fn load(&mut self, key: u32) -> StoreResult<FxHashSet<T>> {
        let Some(bytes) = self.disk.get(key)? else {
            return Ok(FxHashSet::default());
        };
        let replayed = replay::<T>(&bytes).map_err(|e| self.frame_error(&e))?;
        if replayed.frames > 1 {
            self.needs_compaction.insert(key);
        }
        Ok(replayed.set)
    }

    /// Current value of `key`: loaded from disk on first read, with pending
    /// changes folded in.
    fn reconciled(&mut self, key: u32) -> StoreResult<FxHashSet<T>> {
        if let Some(set) = &self.entry(key)?.value {
            return Ok(set.clone());
        }
        let mut set = self.load(key)?;
        let entry = self.cached(key)?;
        for value in entry.removed.drain() {
            set.remove(&value);
        }
        set.extend(entry.added.drain());
        entry.value = Some(set.clone());
        Ok(set)
    }

    /// Write back an entry leaving the cache.
    fn persist(&mut self, key: u32, entry: Entry<T>) -> StoreResult<()> {
        if !entry.dirty {
            return Ok(());
        }
        match entry.value {
            Some(set) => self.write_full(key, &set),
            None => self.write_unreconciled(key, &entry.added, &entry.removed),
        }
    }

    fn write_full(&mut self, key: u32, set: &FxHashSet<T>) -> StoreResult<()> {
        let bytes = encode_base(set).map_err(|e| self.frame_error(&e))?;
        self.needs_compaction.remove(&key);
        trace!(store = self.disk.name(), key, len = set.len(), "write full value");
        self.disk.put(key, &bytes)
    }

    fn write_unreconciled(
        &mut self,
        key: u32,
        added: &FxHashSet<T>,
        removed: &FxHashSet<T>,
    ) -> StoreResult<()> {
        if !self.disk.contains(key) {
            return self.write_full(key, added);
        }
        if self.needs_compaction.contains(&key) {
            let mut set = match self.disk.get(key)? {
                Some(bytes) => replay::<T>(&bytes).map_err(|e| self.frame_error(&e))?.set,
                None => FxHashSet::default(),
            };
            for value in removed {
                set.remove(value);
            }
            set.extend(added.iter().copied());
            return self.write_full(key, &set);
        }
        let bytes = encode_delta(removed, added).map_err(|e| self.frame_error(&e))?;
        if bytes.is_empty() {
            return Ok(());
        }
        trace!(store = self.disk.name(), key, "append delta");
        self.disk.append(key, &bytes)
    }

    fn flush(&mut self) -> StoreResult<()> {
        for (key, entry) in self.cache.drain() {
            self.persist(key, entry)?;
        }
        self.disk.force()
    }
}

/// Who uses each class, and through which member.
pub struct BackDependencyStore {
    store: DeltaSetStore<ReferencerRecord>,
}

impl BackDependencyStore {
    pub fn open(dir: &Path, name: &str, config: &StoreConfig) -> StoreResult<Self> {
        Ok(BackDependencyStore {
            store: DeltaSetStore::open(dir, name, config)?,
        })
    }

    /// Record that `referencer` uses `target`. Self-references are dropped.
    pub fn add_referencer(&self, target: ClassId, referencer: ReferencerRecord) -> StoreResult<()> {
        if referencer.class == target {
            return Ok(());
        }
        self.store.add(target, referencer)
    }

    /// Forget every use of `target` by class `referencer`.
    pub fn remove_referencer(&self, target: ClassId, referencer: ClassId) -> StoreResult<()> {
        for record in self.store.get_all(target)? {
            if record.class == referencer {
                self.store.remove(target, record)?;
            }
        }
        Ok(())
    }

    pub fn referencers(&self, target: ClassId) -> StoreResult<FxHashSet<ReferencerRecord>> {
        self.store.get_all(target)
    }

    /// Back-dependencies of `target` grouped by referencing class.
    pub fn dependencies(&self, target: ClassId) -> StoreResult<Vec<Dependency>> {
        Ok(Dependency::group(self.store.get_all(target)?))
    }

    /// Referencing classes of `target`, sorted.
    pub fn referencing_classes(&self, target: ClassId) -> StoreResult<Vec<ClassId>> {
        let mut classes: Vec<ClassId> = self
            .store
            .get_all(target)?
            .into_iter()
            .map(|record| record.class)
            .collect();
        classes.sort_unstable();
        classes.dedup();
        Ok(classes)
    }

    pub fn remove_key(&self, target: ClassId) -> StoreResult<()> {
        self.store.remove_key(target)
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.store.flush()
    }

    pub fn dispose(self) -> StoreResult<()> {
        self.store.dispose()
    }

    pub fn clear(&self) -> StoreResult<()> {
        self.store.clear()
    }
}
