use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_probationary_evicts_lru() {
    let mut cache = SegmentedLru::new(2, 2);
    assert_eq!(cache.insert(1, "a"), None);
    assert_eq!(cache.insert(2, "b"), None);
    assert_eq!(cache.insert(3, "c"), Some((1, "a")));
    assert_eq!(cache.len(), 2);
    assert!(!cache.contains(&1));
}

#[test]
fn test_accessed_entries_survive_scans() {
    let mut cache = SegmentedLru::new(2, 2);
    cache.insert(1, "hot");
    assert!(cache.touch(&1));

    let mut evicted = Vec::new();
    for key in 10..20 {
        evicted.extend(cache.insert(key, "cold"));
    }
    assert!(cache.contains(&1));
    assert!(evicted.iter().all(|(key, _)| *key != 1));
}

#[test]
fn test_protected_overflow_demotes() {
    let mut cache = SegmentedLru::new(2, 1);
    cache.insert(1, ());
    cache.insert(2, ());
    cache.touch(&1);
    // 2 is promoted, 1 falls back to probationary as its most recent entry.
    cache.touch(&2);
    assert_eq!(cache.len(), 2);

    assert_eq!(cache.insert(3, ()), None);
    // Probationary now holds 1 and 3; 1 is the older one.
    assert_eq!(cache.insert(4, ()), Some((1, ())));
    assert!(cache.contains(&2));
}

#[test]
fn test_touch_missing_key() {
    let mut cache: SegmentedLru<u32, ()> = SegmentedLru::new(1, 1);
    assert!(!cache.touch(&5));
}

#[test]
fn test_insert_existing_replaces_value() {
    let mut cache = SegmentedLru::new(1, 1);
    cache.insert(1, 10);
    assert_eq!(cache.insert(1, 11), None);
    assert_eq!(cache.peek(&1), Some(&11));
    *cache.peek_mut(&1).unwrap() += 1;
    assert_eq!(cache.remove(&1), Some(12));
    assert!(cache.is_empty());
}

#[test]
fn test_drain_returns_everything() {
    let mut cache = SegmentedLru::new(4, 4);
    for key in 0..6 {
        cache.insert(key, key * 10);
    }
    cache.touch(&4);
    let mut drained = cache.drain();
    drained.sort_unstable();
    assert_eq!(drained, vec![(2, 20), (3, 30), (4, 40), (5, 50)]);
    assert!(cache.is_empty());
}

#[test]
fn test_zero_probationary_capacity_still_caches_one() {
    let mut cache = SegmentedLru::new(0, 0);
    assert_eq!(cache.insert(1, ()), None);
    assert_eq!(cache.insert(2, ()), Some((1, ())));
}
