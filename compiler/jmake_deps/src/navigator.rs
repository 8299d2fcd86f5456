//! Walks over the class hierarchy.
//!
//! Superclass and superinterface walks read records through a
//! [`RecordSource`], so the same walk runs over the committed hierarchy or
//! over the view as it was before the current round. Subclass walks read the
//! transitive subclass sets.

use std::sync::Arc;

use jmake_ir::{ClassId, ClassRecord};
use jmake_store::{ClassRecordStore, DependencySetStore, StoreResult};
use rustc_hash::{FxHashMap, FxHashSet};

/// Whether a walk goes on after visiting a class.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Read access to class records.
pub trait RecordSource {
    fn record(&self, id: ClassId) -> StoreResult<Option<Arc<ClassRecord>>>;
}

impl RecordSource for ClassRecordStore {
    fn record(&self, id: ClassId) -> StoreResult<Option<Arc<ClassRecord>>> {
        self.get(id)
    }
}

/// The hierarchy as it was before the current round: records replaced or
/// removed this round are read from the stash, everything else from the
/// committed store.
pub struct OldView<'a> {
    committed: &'a ClassRecordStore,
    /// Previous record of every class touched this round; `None` for
    /// classes that did not exist.
    previous: &'a FxHashMap<ClassId, Option<Arc<ClassRecord>>>,
}

impl<'a> OldView<'a> {
    pub fn new(
        committed: &'a ClassRecordStore,
        previous: &'a FxHashMap<ClassId, Option<Arc<ClassRecord>>>,
    ) -> Self {
        OldView {
            committed,
            previous,
        }
    }
}

impl RecordSource for OldView<'_> {
    fn record(&self, id: ClassId) -> StoreResult<Option<Arc<ClassRecord>>> {
        match self.previous.get(&id) {
            Some(previous) => Ok(previous.clone()),
            None => self.committed.get(id),
        }
    }
}

/// Visit the superclass chain of `from`, nearest first, excluding `from`.
///
/// Stops at the first class without a record.
pub fn walk_super_classes(
    source: &impl RecordSource,
    from: ClassId,
    mut visit: impl FnMut(ClassId) -> StoreResult<Control>,
) -> StoreResult<()> {
    let mut seen = FxHashSet::default();
    seen.insert(from);
    let mut current = source.record(from)?.and_then(|record| record.super_class);
    while let Some(class) = current {
        if !seen.insert(class) || visit(class)? == Control::Stop {
            break;
        }
        current = source.record(class)?.and_then(|record| record.super_class);
    }
    Ok(())
}

/// Visit every interface implemented by `from`, directly, through
/// superinterfaces or through superclasses. Each interface is visited once.
pub fn walk_super_interfaces(
    source: &impl RecordSource,
    from: ClassId,
    mut visit: impl FnMut(ClassId) -> StoreResult<Control>,
) -> StoreResult<()> {
    let mut seen = FxHashSet::default();
    let mut pending = Vec::new();
    let mut class = Some(from);
    let mut classes_seen = FxHashSet::default();
    while let Some(current) = class {
        if !classes_seen.insert(current) {
            break;
        }
        let Some(record) = source.record(current)? else {
            break;
        };
        pending.extend(record.interfaces.iter().rev().copied());
        while let Some(interface) = pending.pop() {
            if !seen.insert(interface) {
                continue;
            }
            if visit(interface)? == Control::Stop {
                return Ok(());
            }
            if let Some(iface) = source.record(interface)? {
                pending.extend(iface.interfaces.iter().rev().copied());
            }
        }
        class = record.super_class;
    }
    Ok(())
}

/// Visit every known supertype of `from` (superclasses and interfaces,
/// transitively), each once.
pub fn for_each_ancestor(
    source: &impl RecordSource,
    from: &ClassRecord,
    mut visit: impl FnMut(ClassId) -> StoreResult<()>,
) -> StoreResult<()> {
    let mut seen = FxHashSet::default();
    seen.insert(from.id);
    let mut pending: Vec<ClassId> = from.supertypes().collect();
    while let Some(ancestor) = pending.pop() {
        if !seen.insert(ancestor) {
            continue;
        }
        visit(ancestor)?;
        if let Some(record) = source.record(ancestor)? {
            pending.extend(record.supertypes());
        }
    }
    Ok(())
}

/// Visit the transitive subclasses of `from` in id order.
pub fn walk_sub_classes(
    subclasses: &DependencySetStore,
    from: ClassId,
    mut visit: impl FnMut(ClassId) -> StoreResult<Control>,
) -> StoreResult<()> {
    let mut all: Vec<ClassId> = subclasses.get_all(from)?.into_iter().collect();
    all.sort_unstable();
    for class in all {
        if visit(class)? == Control::Stop {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
mod tests;
