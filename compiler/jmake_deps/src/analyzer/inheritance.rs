//! Rules for subclasses of a changed class.

use jmake_ir::descriptor::{is_identifier, method_parts, parameter_types, to_source_type};
use jmake_ir::{ClassId, ClassRecord, MemberRecord, MethodRecord, Symbol};
use jmake_store::StoreResult;
use rustc_hash::FxHashSet;
use tracing::warn;

use super::{ChangeImpactAnalyzer, ClassDiff};
use crate::marks::MarkReason;
use crate::navigator::{walk_sub_classes, walk_super_interfaces, Control, RecordSource};
use crate::processors::oracle::MethodPattern;

impl ChangeImpactAnalyzer<'_> {
    pub(super) fn check_subclasses(&mut self, old: &ClassRecord, diff: &ClassDiff) -> StoreResult<()> {
        let id = old.id;
        let removed: Vec<&MethodRecord> = diff
            .removed_methods()
            .filter(|method| !method.constructor)
            .collect();
        let removed_concrete: Vec<MethodRecord> = removed
            .iter()
            .filter(|method| !method.is_abstract())
            .map(|&method| method.clone())
            .collect();
        let removed_overridable: FxHashSet<Symbol> = removed
            .iter()
            .filter(|method| method.is_overridable())
            .map(|method| method.name)
            .collect();
        let remote_interface = old.is_interface() && old.remote;

        let subclasses = self.subclasses;
        let old_view = self.old_view;
        walk_sub_classes(subclasses, id, |sub| {
            if self.marks.is_marked(sub) {
                return Ok(Control::Continue);
            }
            let Some(sub_record) = old_view.record(sub)? else {
                return Ok(Control::Continue);
            };

            if !removed.is_empty() && remote_interface && !sub_record.is_interface() {
                self.mark(sub, MarkReason::RemoteMethodsRemoved(id));
                return Ok(Control::Continue);
            }
            if let Some(reason) = self.subclass_conflict(id, diff, &sub_record)? {
                self.mark(sub, reason);
                return Ok(Control::Continue);
            }
            if !sub_record.flags.is_abstract() && !removed_concrete.is_empty() {
                let mut pending = removed_concrete.clone();
                let mut visited = FxHashSet::default();
                if self.has_unimplemented_abstract(sub, &mut pending, &mut visited)? {
                    self.mark(sub, MarkReason::UnimplementedAbstractMethod(id));
                    return Ok(Control::Continue);
                }
            }
            if !removed_overridable.is_empty()
                && !self.marks.is_marked(sub)
                && !self.compiled.contains(&sub)
                && sub_record
                    .methods
                    .iter()
                    .any(|method| !method.constructor && removed_overridable.contains(&method.name))
            {
                self.mark(sub, MarkReason::OverridesRemovedMethod(id));
            }
            Ok(Control::Continue)
        })
    }

    /// Superlist, finality and member rules for one subclass, first match
    /// wins.
    fn subclass_conflict(
        &self,
        id: ClassId,
        diff: &ClassDiff,
        sub: &ClassRecord,
    ) -> StoreResult<Option<MarkReason>> {
        if diff.super_class_added || diff.interface_added {
            return Ok(Some(MarkReason::SuperlistExtended(id)));
        }
        if diff.became_final && sub.super_class == Some(id) {
            return Ok(Some(MarkReason::ExtendsFinal(id)));
        }

        for member in &diff.added {
            let reason = match member {
                MemberRecord::Method(method) => added_method_conflict(id, method, sub),
                MemberRecord::Field(field) => sub
                    .find_field(field.name)
                    .map(|_| MarkReason::HidesAddedField(id)),
            };
            if reason.is_some() {
                return Ok(reason);
            }
        }

        for (method, change) in &diff.changed_methods {
            if change.became_abstract && !sub.flags.is_abstract() {
                return Ok(Some(MarkReason::InheritsAbstractMethod(id)));
            }
            let key = method.key();
            if sub.find_method_by_key(key).is_some() {
                return Ok(Some(MarkReason::OverridesChangedMethod(id)));
            }
            let old_view = self.old_view;
            let mut declared = false;
            walk_super_interfaces(old_view, sub.id, |interface| {
                declared = old_view
                    .record(interface)?
                    .is_some_and(|record| record.find_method_by_key(key).is_some());
                Ok(if declared { Control::Stop } else { Control::Continue })
            })?;
            if declared {
                return Ok(Some(MarkReason::OverridesChangedMethod(id)));
            }
        }
        Ok(None)
    }

    /// Some method in `pending` ends up abstract for `class`: the nearest
    /// declaration found walking up from `class` is abstract.
    ///
    /// Declarations found concrete are removed from `pending`.
    fn has_unimplemented_abstract(
        &self,
        class: ClassId,
        pending: &mut Vec<MethodRecord>,
        visited: &mut FxHashSet<ClassId>,
    ) -> StoreResult<bool> {
        if pending.is_empty() || !visited.insert(class) {
            return Ok(false);
        }
        let Some(old_record) = self.old_view.record(class)? else {
            if class == self.names.object {
                return Ok(false);
            }
            return Ok(self.declared_abstract_in_source(class, pending));
        };

        // Recompiled ancestors are judged by their new version.
        let record = self.current.get(class)?.unwrap_or(old_record);
        let mut idx = 0;
        while idx < pending.len() {
            match record.find_method_by_key(pending[idx].key()) {
                Some(found) if found.is_abstract() => return Ok(true),
                Some(_) => {
                    pending.swap_remove(idx);
                }
                None => idx += 1,
            }
        }

        if let Some(super_class) = record.super_class {
            if self.has_unimplemented_abstract(super_class, pending, visited)? {
                return Ok(true);
            }
        }
        for &interface in &record.interfaces {
            if self.has_unimplemented_abstract(interface, pending, visited)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Ask the oracle about a class the engine has no record of.
    fn declared_abstract_in_source(&self, class: ClassId, pending: &mut Vec<MethodRecord>) -> bool {
        let Some(oracle) = self.oracle else {
            return false;
        };
        let Some(class_name) = self.symbols.resolve(class) else {
            return false;
        };
        let mut idx = 0;
        while idx < pending.len() {
            let Some(pattern) = self.method_pattern(&pending[idx]) else {
                idx += 1;
                continue;
            };
            match oracle.find_method(&class_name, &pattern) {
                Ok(Some(found)) if found.is_abstract => return true,
                Ok(Some(_)) => {
                    pending.swap_remove(idx);
                }
                Ok(None) => idx += 1,
                Err(cancelled) => {
                    warn!(class = %class_name, %pattern, "{cancelled}");
                    return false;
                }
            }
        }
        false
    }

    fn method_pattern(&self, method: &MethodRecord) -> Option<MethodPattern> {
        let name = self.symbols.resolve(method.name)?;
        if !is_identifier(&name) {
            return None;
        }
        let descriptor = self.symbols.resolve(method.descriptor)?;
        let (params, return_type) = method_parts(&descriptor)?;
        Some(MethodPattern {
            return_type: to_source_type(return_type)?,
            params: parameter_types(params)?
                .into_iter()
                .map(to_source_type)
                .collect::<Option<_>>()?,
            name,
        })
    }
}

/// An added non-abstract method clashes with what the subclass declares.
fn added_method_conflict(id: ClassId, method: &MethodRecord, sub: &ClassRecord) -> Option<MarkReason> {
    if method.is_abstract() {
        return Some(MarkReason::AbstractMethodAdded(id));
    }
    if method.flags.is_private() {
        return None;
    }
    if let Some(derived) = sub.find_method_by_key(method.key()) {
        if method.return_type != derived.return_type
            || method.flags.is_more_accessible_than(derived.flags)
            || (!method.flags.is_static() && derived.flags.is_static())
            || (method.flags.is_final() && !derived.flags.is_final())
            || !method.same_thrown(derived)
        {
            return Some(MarkReason::IncompatibleOverride(id));
        }
    }
    // Same erasure, different generic signature.
    let clash = sub.methods_named(method.name).any(|derived| {
        !derived.flags.is_bridge()
            && derived.descriptor == method.descriptor
            && derived.generic_signature != method.generic_signature
    });
    clash.then_some(MarkReason::GenericsNameClash(id))
}
