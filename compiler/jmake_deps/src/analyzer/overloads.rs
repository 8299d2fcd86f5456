//! Field-name and overload collisions across the hierarchy of a changed
//! class.
//!
//! Adding or removing a member can change which declaration a call or field
//! access elsewhere in the hierarchy resolves to, without touching any
//! member that call site names. These rules are name- and arity-based and
//! over-approximate.

use jmake_ir::descriptor::parameter_types;
use jmake_ir::{ClassId, ClassRecord, MethodRecord, MethodRef, Symbol, SymbolTable};
use jmake_store::StoreResult;
use rustc_hash::FxHashSet;

use super::{ChangeImpactAnalyzer, ClassDiff};
use crate::marks::MarkReason;
use crate::navigator::{walk_sub_classes, walk_super_classes, Control};

/// Some used method has the name and arity of a candidate but differs in at
/// least one parameter type.
pub(super) fn calls_equivalent(
    symbols: &SymbolTable,
    used: &FxHashSet<MethodRef>,
    candidates: &[&MethodRecord],
) -> bool {
    used.iter().any(|used| {
        candidates
            .iter()
            .any(|candidate| is_equivalent(symbols, used, candidate))
    })
}

fn is_equivalent(symbols: &SymbolTable, used: &MethodRef, candidate: &MethodRecord) -> bool {
    if used.name != candidate.name {
        return false;
    }
    let (Some(used_desc), Some(candidate_desc)) = (
        symbols.resolve(used.descriptor),
        symbols.resolve(candidate.descriptor),
    ) else {
        return false;
    };
    match (parameter_types(&used_desc), parameter_types(&candidate_desc)) {
        (Some(used_params), Some(candidate_params)) => {
            used_params.len() == candidate_params.len() && used_params != candidate_params
        }
        _ => false,
    }
}

impl ChangeImpactAnalyzer<'_> {
    /// Users of superclasses (and, for interfaces that gained fields, of
    /// implementors and their superclasses) that access a field whose name
    /// was added to or removed from `old`.
    pub(super) fn check_field_collisions(
        &mut self,
        old: &ClassRecord,
        diff: &ClassDiff,
    ) -> StoreResult<()> {
        let id = old.id;
        let added: FxHashSet<Symbol> = diff.added_fields().map(|field| field.name).collect();
        let mut names = added.clone();
        names.extend(diff.removed_fields().map(|field| field.name));
        if names.is_empty() {
            return Ok(());
        }

        let old_view = self.old_view;
        walk_super_classes(old_view, id, |class| {
            self.mark_field_users(id, class, &names)?;
            Ok(Control::Continue)
        })?;

        if !added.is_empty() && old.is_interface() {
            let subclasses = self.subclasses;
            let mut visited = FxHashSet::default();
            visited.insert(id);
            walk_sub_classes(subclasses, id, |sub| {
                self.mark_field_users(id, sub, &names)?;
                visited.insert(sub);
                walk_super_classes(old_view, sub, |class| {
                    if !visited.insert(class) {
                        return Ok(Control::Stop);
                    }
                    self.mark_field_users(id, class, &names)?;
                    Ok(Control::Continue)
                })?;
                Ok(Control::Continue)
            })?;
        }
        Ok(())
    }

    fn mark_field_users(
        &mut self,
        origin: ClassId,
        class: ClassId,
        names: &FxHashSet<Symbol>,
    ) -> StoreResult<()> {
        for dependency in self.back_deps.dependencies(class)? {
            if !self.marks.is_marked(dependency.class)
                && dependency.fields.iter().any(|name| names.contains(name))
            {
                self.mark(dependency.class, MarkReason::FieldNameCollision(origin));
            }
        }
        Ok(())
    }

    /// Users of superclasses and subclasses of `id` calling a method that
    /// an added or removed method of `id` now competes with.
    pub(super) fn check_overload_collisions(
        &mut self,
        id: ClassId,
        diff: &ClassDiff,
    ) -> StoreResult<()> {
        let methods: Vec<&MethodRecord> = diff
            .removed_methods()
            .chain(diff.added_methods())
            .filter(|method| !method.constructor)
            .collect();
        if methods.is_empty() {
            return Ok(());
        }
        let old_view = self.old_view;
        walk_super_classes(old_view, id, |class| {
            self.mark_overload_users(id, class, &methods)?;
            Ok(Control::Continue)
        })?;
        let subclasses = self.subclasses;
        walk_sub_classes(subclasses, id, |class| {
            self.mark_overload_users(id, class, &methods)?;
            Ok(Control::Continue)
        })
    }

    fn mark_overload_users(
        &mut self,
        origin: ClassId,
        class: ClassId,
        methods: &[&MethodRecord],
    ) -> StoreResult<()> {
        for dependency in self.back_deps.dependencies(class)? {
            if !self.marks.is_marked(dependency.class)
                && calls_equivalent(self.symbols, &dependency.methods, methods)
            {
                self.mark(dependency.class, MarkReason::OverloadCollision(origin));
            }
        }
        Ok(())
    }
}
