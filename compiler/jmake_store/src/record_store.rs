//! Persistent class records with a dirty-bit write-back cache.

use std::path::Path;
use std::sync::Arc;

use jmake_ir::{ClassId, ClassRecord};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::config::StoreConfig;
use crate::disk::LogStore;
use crate::error::{CacheCorrupted, StoreResult};
use crate::slru::SegmentedLru;

struct Cached {
    record: Arc<ClassRecord>,
    /// Changed since it was loaded; written back on eviction.
    dirty: bool,
}

struct Inner {
    disk: LogStore,
    cache: SegmentedLru<u32, Cached>,
}

/// Persistent map from class id to [`ClassRecord`].
///
/// Records are handed out as shared snapshots; [`ClassRecordStore::update`]
/// copies on write.
pub struct ClassRecordStore {
    inner: Mutex<Inner>,
}

impl ClassRecordStore {
    pub fn open(dir: &Path, name: &str, config: &StoreConfig) -> StoreResult<Self> {
        let (probationary, protected) = config.segments(config.record_cache_capacity);
        Ok(ClassRecordStore {
            inner: Mutex::new(Inner {
                disk: LogStore::open(dir, name, config.compaction_min_bytes)?,
                cache: SegmentedLru::new(probationary, protected),
            }),
        })
    }

    pub fn get(&self, id: ClassId) -> StoreResult<Option<Arc<ClassRecord>>> {
        let mut inner = self.inner.lock();
        inner.load(id.raw())
    }

    /// Store `record` under `id`. The transient reference list is dropped.
    pub fn put(&self, id: ClassId, mut record: ClassRecord) -> StoreResult<()> {
        record.references.clear();
        self.inner.lock().insert(
            id.raw(),
            Cached {
                record: Arc::new(record),
                dirty: true,
            },
        )
    }

    pub fn remove(&self, id: ClassId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.cache.remove(&id.raw());
        inner.disk.remove(id.raw())
    }

    pub fn contains_id(&self, id: ClassId) -> bool {
        let inner = self.inner.lock();
        inner.cache.contains(&id.raw()) || inner.disk.contains(id.raw())
    }

    pub fn all_ids(&self) -> FxHashSet<ClassId> {
        let inner = self.inner.lock();
        inner
            .disk
            .keys()
            .chain(inner.cache.keys())
            .map(ClassId::from_raw)
            .collect()
    }

    /// Mutate the stored record in place. Returns `false` if there is none.
    pub fn update(&self, id: ClassId, f: impl FnOnce(&mut ClassRecord)) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        let key = id.raw();
        if inner.load(key)?.is_none() {
            return Ok(false);
        }
        let Some(cached) = inner.cache.peek_mut(&key) else {
            return Ok(false);
        };
        f(Arc::make_mut(&mut cached.record));
        cached.dirty = true;
        Ok(true)
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.inner.lock().flush()
    }

    pub fn dispose(self) -> StoreResult<()> {
        self.inner.into_inner().flush()
    }

    pub fn clear(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.cache.clear();
        inner.disk.clear()
    }
}

impl Inner {
    fn load(&mut self, key: u32) -> StoreResult<Option<Arc<ClassRecord>>> {
        if self.cache.touch(&key) {
            return Ok(self.cache.peek(&key).map(|cached| Arc::clone(&cached.record)));
        }
        let Some(bytes) = self.disk.get(key)? else {
            return Ok(None);
        };
        let record: ClassRecord =
            bincode::deserialize(&bytes).map_err(|e| CacheCorrupted::codec(self.disk.name(), e))?;
        let record = Arc::new(record);
        self.insert(
            key,
            Cached {
                record: Arc::clone(&record),
                dirty: false,
            },
        )?;
        Ok(Some(record))
    }

    fn insert(&mut self, key: u32, cached: Cached) -> StoreResult<()> {
        if let Some((evicted_key, evicted)) = self.cache.insert(key, cached) {
            self.write_back(evicted_key, &evicted)?;
        }
        Ok(())
    }

    fn write_back(&mut self, key: u32, cached: &Cached) -> StoreResult<()> {
        if !cached.dirty {
            return Ok(());
        }
        let bytes = bincode::serialize(cached.record.as_ref())
            .map_err(|e| CacheCorrupted::codec(self.disk.name(), e))?;
        trace!(store = self.disk.name(), key, len = bytes.len(), "write back record");
        self.disk.put(key, &bytes)
    }

    fn flush(&mut self) -> StoreResult<()> {
        for (key, cached) in self.cache.drain() {
            self.write_back(key, &cached)?;
        }
        self.disk.force()
    }
}
