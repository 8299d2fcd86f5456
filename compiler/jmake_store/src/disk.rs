//! Snapshot plus append-log backend.
//!
//! A named store is two files in the cache directory:
//!
//! - `<name>.snap`: magic header, then `[key u32][len u32][bytes]` entries.
//!   Written only by compaction and replaced atomically.
//! - `<name>.log`: `[op u8][key u32][len u32][bytes]` entries appended in
//!   write order.
//!
//! Opening scans both files into an index of extents per key; values stay
//! on disk. All integers are little-endian.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::{CacheCorrupted, StoreResult};

const SNAP_MAGIC: &[u8; 8] = b"JMKSNAP1";

const OP_PUT: u8 = 1;
const OP_APPEND: u8 = 2;
const OP_REMOVE: u8 = 3;

const LOG_HEADER: u64 = 9;
const SNAP_HEADER: u64 = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Source {
    Snapshot,
    Log,
}

/// Location of one chunk of a key's value.
#[derive(Copy, Clone, Debug)]
struct Extent {
    source: Source,
    offset: u64,
    len: u32,
}

/// Key → bytes store backed by an immutable snapshot and an append log.
pub struct LogStore {
    name: String,
    snap_path: PathBuf,
    log_path: PathBuf,
    snapshot: Option<File>,
    snap_len: u64,
    log: File,
    log_len: u64,
    index: FxHashMap<u32, Vec<Extent>>,
    compaction_min_bytes: u64,
}

impl LogStore {
    /// Open (or create) the store `name` under `dir`.
    pub fn open(dir: &Path, name: &str, compaction_min_bytes: u64) -> StoreResult<Self> {
        fs::create_dir_all(dir).map_err(|e| CacheCorrupted::io(dir, e))?;
        let snap_path = dir.join(format!("{name}.snap"));
        let log_path = dir.join(format!("{name}.log"));

        let mut index = FxHashMap::default();
        let (snapshot, snap_len) = if snap_path.exists() {
            let bytes = fs::read(&snap_path).map_err(|e| CacheCorrupted::io(&snap_path, e))?;
            scan_snapshot(name, &bytes, &mut index)?;
            let file = File::open(&snap_path).map_err(|e| CacheCorrupted::io(&snap_path, e))?;
            (Some(file), bytes.len() as u64)
        } else {
            (None, 0)
        };

        let log_len = if log_path.exists() {
            let bytes = fs::read(&log_path).map_err(|e| CacheCorrupted::io(&log_path, e))?;
            scan_log(name, &bytes, &mut index)?;
            bytes.len() as u64
        } else {
            0
        };
        let log = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_path)
            .map_err(|e| CacheCorrupted::io(&log_path, e))?;

        trace!(store = name, keys = index.len(), snap_len, log_len, "opened store");
        Ok(LogStore {
            name: name.to_string(),
            snap_path,
            log_path,
            snapshot,
            snap_len,
            log,
            log_len,
            index,
            compaction_min_bytes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, key: u32) -> bool {
        self.index.contains_key(&key)
    }

    /// All keys with a value.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.keys().copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The key's value: all of its extents concatenated.
    pub fn get(&mut self, key: u32) -> StoreResult<Option<Vec<u8>>> {
        let Some(extents) = self.index.get(&key) else {
            return Ok(None);
        };
        let extents = extents.clone();
        let total: usize = extents.iter().map(|extent| extent.len as usize).sum();
        let mut value = vec![0u8; total];
        let mut pos = 0;
        for extent in extents {
            let end = pos + extent.len as usize;
            self.read_extent(extent, &mut value[pos..end])?;
            pos = end;
        }
        Ok(Some(value))
    }

    /// Replace the key's value.
    pub fn put(&mut self, key: u32, bytes: &[u8]) -> StoreResult<()> {
        let extent = self.write_entry(OP_PUT, key, bytes)?;
        self.index.insert(key, vec![extent]);
        Ok(())
    }

    /// Extend the key's value without rewriting it.
    pub fn append(&mut self, key: u32, bytes: &[u8]) -> StoreResult<()> {
        let extent = self.write_entry(OP_APPEND, key, bytes)?;
        self.index.entry(key).or_default().push(extent);
        Ok(())
    }

    pub fn remove(&mut self, key: u32) -> StoreResult<()> {
        if self.index.remove(&key).is_some() {
            self.write_entry(OP_REMOVE, key, &[])?;
        }
        Ok(())
    }

    /// Sync the log, compacting it into the snapshot when it has outgrown
    /// both the snapshot and the configured minimum.
    pub fn force(&mut self) -> StoreResult<()> {
        self.log
            .sync_data()
            .map_err(|e| CacheCorrupted::io(&self.log_path, e))?;
        if self.log_len > self.compaction_min_bytes && self.log_len > self.snap_len {
            self.compact()?;
        }
        Ok(())
    }

    /// Rewrite every live value into a fresh snapshot and reset the log.
    pub fn compact(&mut self) -> StoreResult<()> {
        let mut keys: Vec<u32> = self.index.keys().copied().collect();
        keys.sort_unstable();

        let mut out = Vec::with_capacity(self.snap_len as usize + self.log_len as usize);
        out.extend_from_slice(SNAP_MAGIC);
        let mut index = FxHashMap::default();
        for key in keys {
            let Some(value) = self.get(key)? else {
                continue;
            };
            let len = self.value_len(&value)?;
            out.extend_from_slice(&key.to_le_bytes());
            out.extend_from_slice(&len.to_le_bytes());
            let extent = Extent {
                source: Source::Snapshot,
                offset: out.len() as u64,
                len,
            };
            out.extend_from_slice(&value);
            index.insert(key, vec![extent]);
        }

        let tmp = self.snap_path.with_extension("snap.tmp");
        write_synced(&tmp, &out)?;
        fs::rename(&tmp, &self.snap_path).map_err(|e| CacheCorrupted::io(&self.snap_path, e))?;
        self.snapshot =
            Some(File::open(&self.snap_path).map_err(|e| CacheCorrupted::io(&self.snap_path, e))?);
        self.snap_len = out.len() as u64;

        self.log
            .set_len(0)
            .map_err(|e| CacheCorrupted::io(&self.log_path, e))?;
        self.log_len = 0;
        self.index = index;
        trace!(store = %self.name, snap_len = self.snap_len, "compacted store");
        Ok(())
    }

    /// Drop every key, leaving empty files behind.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.index.clear();
        write_synced(&self.snap_path, SNAP_MAGIC)?;
        self.snapshot =
            Some(File::open(&self.snap_path).map_err(|e| CacheCorrupted::io(&self.snap_path, e))?);
        self.snap_len = SNAP_HEADER;
        self.log
            .set_len(0)
            .map_err(|e| CacheCorrupted::io(&self.log_path, e))?;
        self.log_len = 0;
        Ok(())
    }

    fn value_len(&self, bytes: &[u8]) -> StoreResult<u32> {
        u32::try_from(bytes.len()).map_err(|_| {
            CacheCorrupted::malformed(&self.name, format!("value of {} bytes", bytes.len()))
        })
    }

    fn write_entry(&mut self, op: u8, key: u32, bytes: &[u8]) -> StoreResult<Extent> {
        let len = self.value_len(bytes)?;
        let mut entry = Vec::with_capacity(LOG_HEADER as usize + bytes.len());
        entry.push(op);
        entry.extend_from_slice(&key.to_le_bytes());
        entry.extend_from_slice(&len.to_le_bytes());
        entry.extend_from_slice(bytes);
        self.log
            .write_all(&entry)
            .map_err(|e| CacheCorrupted::io(&self.log_path, e))?;
        let extent = Extent {
            source: Source::Log,
            offset: self.log_len + LOG_HEADER,
            len,
        };
        self.log_len += entry.len() as u64;
        Ok(extent)
    }

    fn read_extent(&mut self, extent: Extent, buf: &mut [u8]) -> StoreResult<()> {
        let (file, path) = match extent.source {
            Source::Log => (&mut self.log, &self.log_path),
            Source::Snapshot => match self.snapshot.as_mut() {
                Some(file) => (file, &self.snap_path),
                None => {
                    return Err(CacheCorrupted::malformed(
                        &self.name,
                        "snapshot extent without a snapshot file",
                    ))
                }
            },
        };
        file.seek(SeekFrom::Start(extent.offset))
            .and_then(|_| file.read_exact(buf))
            .map_err(|e| CacheCorrupted::io(path, e))
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("name", &self.name)
            .field("keys", &self.index.len())
            .field("snap_len", &self.snap_len)
            .field("log_len", &self.log_len)
            .finish_non_exhaustive()
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut file = File::create(path).map_err(|e| CacheCorrupted::io(path, e))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| CacheCorrupted::io(path, e))
}

fn read_u32(bytes: &[u8], pos: usize) -> Option<u32> {
    let chunk = bytes.get(pos..pos + 4)?;
    Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

fn scan_snapshot(
    name: &str,
    bytes: &[u8],
    index: &mut FxHashMap<u32, Vec<Extent>>,
) -> StoreResult<()> {
    if bytes.get(..SNAP_MAGIC.len()) != Some(SNAP_MAGIC.as_slice()) {
        return Err(CacheCorrupted::malformed(name, "bad snapshot header"));
    }
    let mut pos = SNAP_MAGIC.len();
    while pos < bytes.len() {
        let (Some(key), Some(len)) = (read_u32(bytes, pos), read_u32(bytes, pos + 4)) else {
            return Err(CacheCorrupted::malformed(
                name,
                format!("truncated snapshot entry at offset {pos}"),
            ));
        };
        let start = pos + 8;
        let end = start + len as usize;
        if end > bytes.len() {
            return Err(CacheCorrupted::malformed(
                name,
                format!("snapshot value for key {key} runs past end of file"),
            ));
        }
        index.insert(
            key,
            vec![Extent {
                source: Source::Snapshot,
                offset: start as u64,
                len,
            }],
        );
        pos = end;
    }
    Ok(())
}

fn scan_log(name: &str, bytes: &[u8], index: &mut FxHashMap<u32, Vec<Extent>>) -> StoreResult<()> {
    let mut pos = 0;
    while pos < bytes.len() {
        let op = bytes[pos];
        let (Some(key), Some(len)) = (read_u32(bytes, pos + 1), read_u32(bytes, pos + 5)) else {
            return Err(CacheCorrupted::malformed(
                name,
                format!("truncated log entry at offset {pos}"),
            ));
        };
        let start = pos + LOG_HEADER as usize;
        let end = start + len as usize;
        if end > bytes.len() {
            return Err(CacheCorrupted::malformed(
                name,
                format!("log value for key {key} runs past end of file"),
            ));
        }
        let extent = Extent {
            source: Source::Log,
            offset: start as u64,
            len,
        };
        match op {
            OP_PUT => {
                index.insert(key, vec![extent]);
            }
            OP_APPEND => index.entry(key).or_default().push(extent),
            OP_REMOVE => {
                index.remove(&key);
            }
            _ => {
                return Err(CacheCorrupted::malformed(
                    name,
                    format!("unknown log op {op} at offset {pos}"),
                ))
            }
        }
        pos = end;
    }
    Ok(())
}
