//! Segmented LRU cache.
//!
//! New entries enter the probationary segment. A second access promotes an
//! entry to the protected segment; when that overflows its least recently
//! used entry is demoted back to probationary. Only the probationary
//! segment evicts, so a scan of one-shot keys never flushes the hot set.

use std::collections::BTreeMap;
use std::hash::Hash;

use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Segment {
    Probationary,
    Protected,
}

struct Slot<V> {
    value: V,
    segment: Segment,
    tick: u64,
}

/// Bounded map with segmented-LRU eviction.
///
/// Evicted entries are handed back to the caller, which owns write-back.
pub struct SegmentedLru<K, V> {
    slots: FxHashMap<K, Slot<V>>,
    probationary: BTreeMap<u64, K>,
    protected: BTreeMap<u64, K>,
    probationary_capacity: usize,
    protected_capacity: usize,
    tick: u64,
}

impl<K: Copy + Eq + Hash, V> SegmentedLru<K, V> {
    pub fn new(probationary_capacity: usize, protected_capacity: usize) -> Self {
        SegmentedLru {
            slots: FxHashMap::default(),
            probationary: BTreeMap::new(),
            protected: BTreeMap::new(),
            probationary_capacity: probationary_capacity.max(1),
            protected_capacity,
            tick: 0,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.slots.keys().copied()
    }

    /// Borrow without counting as an access.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Mutably borrow without counting as an access.
    pub fn peek_mut(&mut self, key: &K) -> Option<&mut V> {
        self.slots.get_mut(key).map(|slot| &mut slot.value)
    }

    /// Record an access. Returns `false` if the key is not cached.
    ///
    /// Promotion moves an entry out of probationary before anything is
    /// demoted into it, so an access never evicts.
    pub fn touch(&mut self, key: &K) -> bool {
        let tick = self.next_tick();
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };
        match slot.segment {
            Segment::Probationary => {
                self.probationary.remove(&slot.tick);
                slot.segment = Segment::Protected;
                slot.tick = tick;
                self.protected.insert(tick, *key);
                self.demote_overflow();
            }
            Segment::Protected => {
                self.protected.remove(&slot.tick);
                slot.tick = tick;
                self.protected.insert(tick, *key);
            }
        }
        true
    }

    /// Insert or replace. Returns the entry evicted to make room, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.value = value;
            self.touch(&key);
            return None;
        }
        let tick = self.next_tick();
        self.slots.insert(
            key,
            Slot {
                value,
                segment: Segment::Probationary,
                tick,
            },
        );
        self.probationary.insert(tick, key);
        if self.probationary.len() > self.probationary_capacity {
            return self.evict_probationary();
        }
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.slots.remove(key)?;
        match slot.segment {
            Segment::Probationary => self.probationary.remove(&slot.tick),
            Segment::Protected => self.protected.remove(&slot.tick),
        };
        Some(slot.value)
    }

    /// Remove every entry, least recently used first.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let order: Vec<K> = self
            .probationary
            .values()
            .chain(self.protected.values())
            .copied()
            .collect();
        self.probationary.clear();
        self.protected.clear();
        let mut entries = Vec::with_capacity(order.len());
        for key in order {
            if let Some(slot) = self.slots.remove(&key) {
                entries.push((key, slot.value));
            }
        }
        entries
    }

    /// Forget every entry without handing them back.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.probationary.clear();
        self.protected.clear();
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn demote_overflow(&mut self) {
        while self.protected.len() > self.protected_capacity {
            let Some((_, key)) = self.protected.pop_first() else {
                return;
            };
            let tick = self.next_tick();
            if let Some(slot) = self.slots.get_mut(&key) {
                slot.segment = Segment::Probationary;
                slot.tick = tick;
                self.probationary.insert(tick, key);
            }
        }
    }

    fn evict_probationary(&mut self) -> Option<(K, V)> {
        let (_, key) = self.probationary.pop_first()?;
        self.slots.remove(&key).map(|slot| (key, slot.value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
mod tests;
