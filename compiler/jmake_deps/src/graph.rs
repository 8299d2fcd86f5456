//! Maintenance of the dependency graph across a build round.
//!
//! For each changed class the graph manager retracts the edges recorded for
//! its previous version, promotes the freshly compiled record into the
//! committed store, records forward and back edges for the new version,
//! recomputes the remote flag and registers the class with its ancestors'
//! subclass sets. Removed classes are deleted from every store.

use std::path::Path;
use std::sync::Arc;

use jmake_ir::descriptor::{descriptor_classes, signature_classes};
use jmake_ir::{
    ClassId, ClassRecord, ClassReference, MemberRef, ReferencerRecord, Symbol, SymbolTable,
};
use jmake_store::{
    BackDependencyStore, ClassRecordStore, DependencySetStore, StoreConfig, StoreResult,
};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::navigator::for_each_ancestor;
use crate::well_known::WellKnown;

/// Every persistent store of one engine.
pub(crate) struct Stores {
    /// Committed class records.
    pub classes: ClassRecordStore,
    /// Records imported this round, not yet promoted.
    pub scratch: ClassRecordStore,
    pub back_deps: BackDependencyStore,
    /// Classes referenced by each class.
    pub referenced: DependencySetStore,
    /// Transitive subclasses (and implementors) of each class.
    pub subclasses: DependencySetStore,
}

impl Stores {
    pub fn open(dir: &Path, config: &StoreConfig) -> StoreResult<Self> {
        Ok(Stores {
            classes: ClassRecordStore::open(dir, "classes", config)?,
            scratch: ClassRecordStore::open(dir, "new_classes", config)?,
            back_deps: BackDependencyStore::open(dir, "back_deps", config)?,
            referenced: DependencySetStore::open(dir, "referenced", config)?,
            subclasses: DependencySetStore::open(dir, "subclasses", config)?,
        })
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.classes.flush()?;
        self.scratch.flush()?;
        self.back_deps.flush()?;
        self.referenced.flush()?;
        self.subclasses.flush()
    }

    pub fn dispose(self) -> StoreResult<()> {
        self.classes.dispose()?;
        self.scratch.dispose()?;
        self.back_deps.dispose()?;
        self.referenced.dispose()?;
        self.subclasses.dispose()
    }

    pub fn clear(&self) -> StoreResult<()> {
        self.classes.clear()?;
        self.scratch.clear()?;
        self.back_deps.clear()?;
        self.referenced.clear()?;
        self.subclasses.clear()
    }
}

pub(crate) struct GraphManager<'a> {
    pub stores: &'a Stores,
    pub symbols: &'a SymbolTable,
    pub names: &'a WellKnown,
}

impl GraphManager<'_> {
    /// Drop the edges recorded for `id`'s previous version.
    pub fn retract(&self, id: ClassId, old: Option<&ClassRecord>) -> StoreResult<()> {
        let stores = self.stores;
        for target in stores.referenced.get_all(id)? {
            if stores.classes.contains_id(target) {
                stores.back_deps.remove_referencer(target, id)?;
            }
        }
        stores.referenced.remove_key(id)?;
        if let Some(old) = old {
            for_each_ancestor(&stores.classes, old, |ancestor| {
                if stores.classes.contains_id(ancestor) {
                    stores.subclasses.remove(ancestor, id)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Move the compiled record of `id` into the committed store. `None` if
    /// `id` was not imported this round.
    pub fn promote(&self, id: ClassId) -> StoreResult<Option<Arc<ClassRecord>>> {
        let Some(record) = self.stores.scratch.get(id)? else {
            return Ok(None);
        };
        let (committed, _) = record.without_references();
        self.stores.classes.put(id, committed)?;
        Ok(Some(record))
    }

    /// Record an edge for every class the new version of `record` mentions.
    pub fn add_forward_edges(
        &self,
        record: &ClassRecord,
        references: &[ClassReference],
    ) -> StoreResult<()> {
        let from = record.id;
        let mut targets: Vec<ClassId> = record.supertypes().collect();
        self.signature_targets(record.generic_signature, &mut targets);
        record.annotations.for_each_class(&mut |class| targets.push(class));

        for field in &record.fields {
            self.descriptor_targets(field.descriptor, &mut targets);
            self.signature_targets(field.generic_signature, &mut targets);
            field.annotations.for_each_class(&mut |class| targets.push(class));
        }
        for method in &record.methods {
            self.descriptor_targets(method.descriptor, &mut targets);
            self.signature_targets(method.generic_signature, &mut targets);
            targets.extend(method.thrown.iter().copied());
            method.annotations.for_each_class(&mut |class| targets.push(class));
            for parameter in &method.parameter_annotations {
                parameter.for_each_class(&mut |class| targets.push(class));
            }
            if let Some(default) = &method.annotation_default {
                default.for_each_class(&mut |class| targets.push(class));
            }
        }
        targets.sort_unstable();
        targets.dedup();
        for target in targets {
            self.add_edge(from, target, MemberRef::Class)?;
        }

        for reference in references {
            match *reference {
                ClassReference::Class(target) => self.add_edge(from, target, MemberRef::Class)?,
                ClassReference::Field { owner, name } => {
                    let declaring = self.field_owner(owner, name)?;
                    self.add_edge(from, declaring, MemberRef::Field { name })?;
                }
                ClassReference::Method {
                    owner,
                    name,
                    descriptor,
                } => {
                    let declaring = self.method_owner(owner, name, descriptor)?;
                    self.add_edge(from, declaring, MemberRef::Method { name, descriptor })?;
                }
            }
        }
        Ok(())
    }

    fn add_edge(&self, from: ClassId, target: ClassId, member: MemberRef) -> StoreResult<()> {
        if target == from || !self.stores.classes.contains_id(target) {
            return Ok(());
        }
        self.stores
            .back_deps
            .add_referencer(target, ReferencerRecord { class: from, member })?;
        self.stores.referenced.add(from, target)
    }

    fn descriptor_targets(&self, descriptor: Symbol, out: &mut Vec<ClassId>) {
        let Some(descriptor) = self.symbols.resolve(descriptor) else {
            return;
        };
        out.extend(
            descriptor_classes(&descriptor)
                .iter()
                .filter_map(|name| self.symbols.lookup(name)),
        );
    }

    fn signature_targets(&self, signature: Option<Symbol>, out: &mut Vec<ClassId>) {
        let Some(signature) = signature.and_then(|sig| self.symbols.resolve(sig)) else {
            return;
        };
        out.extend(
            signature_classes(&signature)
                .iter()
                .filter_map(|name| self.symbols.lookup(name)),
        );
    }

    /// The class declaring field `name`, searching up from the class named at
    /// the use site. Falls back to `owner` if no ancestor declares it.
    fn field_owner(&self, owner: ClassId, name: Symbol) -> StoreResult<ClassId> {
        self.declaring_class(owner, |record| record.find_field(name).is_some())
    }

    fn method_owner(&self, owner: ClassId, name: Symbol, descriptor: Symbol) -> StoreResult<ClassId> {
        self.declaring_class(owner, |record| record.find_method(name, descriptor).is_some())
    }

    fn declaring_class(
        &self,
        owner: ClassId,
        declares: impl Fn(&ClassRecord) -> bool,
    ) -> StoreResult<ClassId> {
        let mut seen = FxHashSet::default();
        let mut current = Some(owner);
        while let Some(class) = current {
            if !seen.insert(class) {
                break;
            }
            let Some(record) = self.stores.classes.get(class)? else {
                break;
            };
            if declares(&record) {
                if class != owner {
                    trace!(
                        owner = %self.symbols.display_name(owner),
                        declaring = %self.symbols.display_name(class),
                        "member reference corrected to declaring class"
                    );
                }
                return Ok(class);
            }
            current = record.super_class;
        }
        Ok(owner)
    }

    /// Recompute whether `id` implements the remote marker through its
    /// superinterfaces.
    pub fn update_remote_flag(&self, id: ClassId) -> StoreResult<()> {
        let mut seen = FxHashSet::default();
        seen.insert(id);
        let remote = self.implements_marker(id, &mut seen)?;
        let Some(record) = self.stores.classes.get(id)? else {
            return Ok(());
        };
        if record.remote != remote {
            self.stores.classes.update(id, |record| record.remote = remote)?;
        }
        Ok(())
    }

    fn implements_marker(&self, id: ClassId, seen: &mut FxHashSet<ClassId>) -> StoreResult<bool> {
        let Some(record) = self.stores.classes.get(id)? else {
            return Ok(false);
        };
        for &interface in &record.interfaces {
            if interface == self.names.remote_marker {
                return Ok(true);
            }
            if seen.insert(interface) && self.implements_marker(interface, seen)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Register `record` in the subclass set of each of its known ancestors.
    pub fn add_subclass_edges(&self, record: &ClassRecord) -> StoreResult<()> {
        let stores = self.stores;
        for_each_ancestor(&stores.classes, record, |ancestor| {
            if stores.classes.contains_id(ancestor) {
                stores.subclasses.add(ancestor, record.id)?;
            }
            Ok(())
        })
    }

    /// Delete a class whose source is gone from every store.
    pub fn remove_class(&self, id: ClassId, old: Option<&ClassRecord>) -> StoreResult<()> {
        self.retract(id, old)?;
        let stores = self.stores;
        stores.classes.remove(id)?;
        stores.scratch.remove(id)?;
        stores.back_deps.remove_key(id)?;
        stores.subclasses.remove_key(id)?;
        trace!(class = %self.symbols.display_name(id), "class removed");
        Ok(())
    }
}
