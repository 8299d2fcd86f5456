//! Change-impact analysis for one recompiled class.
//!
//! Given the old and new record of a class `Q`, decides which other classes
//! must be recompiled. Rules run in a fixed order; annotation-type and
//! superlist rules are exhaustive and end the analysis of `Q`. The remaining
//! rules examine back-dependents of `Q`, then subclasses of `Q`, then
//! classes related to `Q` whose field or overload resolution may have
//! changed.
//!
//! The analysis reads the hierarchy as it was before the round
//! ([`OldView`]) except where a later version of a class is what matters
//! (whether an ancestor still declares an abstract method).

mod annotations;
pub mod diff;
mod inheritance;
mod overloads;

use jmake_ir::descriptor::is_anonymous_class;
use jmake_ir::{ClassId, ClassRecord, Dependency, SymbolTable};
use jmake_store::{BackDependencyStore, ClassRecordStore, DependencySetStore, StoreResult};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::marks::{MarkReason, RecompileSet};
use crate::navigator::{walk_sub_classes, Control, OldView};
use crate::processors::oracle::UsageOracle;
use crate::well_known::WellKnown;

pub use diff::{ClassDiff, MethodChange};

/// Everything one analysis pass reads, plus the mark set it writes.
pub(crate) struct ChangeImpactAnalyzer<'a> {
    pub symbols: &'a SymbolTable,
    pub names: &'a WellKnown,
    /// Hierarchy before the round.
    pub old_view: &'a OldView<'a>,
    /// Committed records; recompiled classes at their new version.
    pub current: &'a ClassRecordStore,
    pub back_deps: &'a BackDependencyStore,
    pub subclasses: &'a DependencySetStore,
    /// Classes compiled this round.
    pub compiled: &'a FxHashSet<ClassId>,
    pub oracle: Option<&'a dyn UsageOracle>,
    pub marks: &'a mut RecompileSet,
}

impl ChangeImpactAnalyzer<'_> {
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(class = %self.symbols.display_name(old.id))
    )]
    pub fn analyze(&mut self, old: &ClassRecord, diff: &ClassDiff) -> StoreResult<()> {
        if diff.is_unchanged() {
            trace!("no structural change");
            return Ok(());
        }
        let id = old.id;
        let dependents = self.back_deps.dependencies(id)?;

        if old.is_annotation() && self.check_annotation_type(id, diff, &dependents)? {
            return Ok(());
        }
        if diff.superlist_invalidates() {
            return self.mark_hierarchy_users(id, &dependents, MarkReason::SuperlistChanged(id));
        }
        if diff.kind_changed {
            return self.mark_hierarchy_users(id, &dependents, MarkReason::KindChanged(id));
        }

        if diff.became_final {
            self.mark_all(&dependents, MarkReason::BecameFinal(id));
        } else {
            self.check_dependents(old, diff, &dependents);
        }

        self.check_subclasses(old, diff)?;

        let anonymous = self
            .symbols
            .with_name(id, is_anonymous_class)
            .unwrap_or(false);
        if !anonymous {
            self.check_field_collisions(old, diff)?;
            self.check_overload_collisions(id, diff)?;
        }
        Ok(())
    }

    fn mark(&mut self, class: ClassId, reason: MarkReason) -> bool {
        self.marks.mark(class, reason, self.symbols)
    }

    fn mark_all(&mut self, dependents: &[Dependency], reason: MarkReason) {
        for dependency in dependents {
            self.mark(dependency.class, reason);
        }
    }

    /// Mark users of `id` and users of every subclass of `id`.
    fn mark_hierarchy_users(
        &mut self,
        id: ClassId,
        dependents: &[Dependency],
        reason: MarkReason,
    ) -> StoreResult<()> {
        self.mark_all(dependents, reason);
        let subclasses = self.subclasses;
        let back_deps = self.back_deps;
        walk_sub_classes(subclasses, id, |sub| {
            let users = back_deps.dependencies(sub)?;
            self.mark_all(&users, reason);
            Ok(Control::Continue)
        })
    }

    /// Per-dependent rules, first match wins.
    fn check_dependents(&mut self, old: &ClassRecord, diff: &ClassDiff, dependents: &[Dependency]) {
        let id = old.id;
        let removed: Vec<_> = diff.removed_methods().collect();
        let added: Vec<_> = diff.added_methods().collect();
        for dependency in dependents {
            if self.marks.is_marked(dependency.class) {
                continue;
            }
            let reason = if diff.access_restricted {
                MarkReason::AccessRestricted(id)
            } else if diff.became_abstract && uses_constructor(old, dependency) {
                MarkReason::ConstructsAbstract(id)
            } else if uses_removed_member(diff, dependency) {
                MarkReason::UsesRemovedMember(id)
            } else if uses_changed_member(diff, dependency) {
                MarkReason::UsesChangedMember(id)
            } else if overloads::calls_equivalent(self.symbols, &dependency.methods, &removed)
                || overloads::calls_equivalent(self.symbols, &dependency.methods, &added)
            {
                MarkReason::AmbiguousOverload(id)
            } else {
                continue;
            };
            self.mark(dependency.class, reason);
        }
    }
}

/// The dependent calls a constructor of the old version.
fn uses_constructor(old: &ClassRecord, dependency: &Dependency) -> bool {
    dependency.methods.iter().any(|used| {
        old.find_method(used.name, used.descriptor)
            .is_some_and(|method| method.constructor)
    })
}

fn uses_removed_member(diff: &ClassDiff, dependency: &Dependency) -> bool {
    dependency.fields.iter().any(|&name| diff.is_removed_field(name))
        || dependency
            .methods
            .iter()
            .any(|used| diff.is_removed_method(used.name, used.descriptor))
}

fn uses_changed_member(diff: &ClassDiff, dependency: &Dependency) -> bool {
    dependency.fields.iter().any(|&name| diff.is_changed_field(name))
        || dependency.methods.iter().any(|used| {
            diff.method_change(used.name, used.descriptor)
                .is_some_and(MethodChange::affects_callers)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
mod tests;
