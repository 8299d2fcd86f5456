//! Rules for changed annotation types.

use jmake_ir::{ClassId, Dependency};
use jmake_store::StoreResult;
use rustc_hash::FxHashSet;

use super::{ChangeImpactAnalyzer, ClassDiff};
use crate::marks::MarkReason;
use crate::navigator::RecordSource;

impl ChangeImpactAnalyzer<'_> {
    /// Apply the annotation-type rules. Returns `true` if one matched, which
    /// ends the analysis of `id`.
    pub(super) fn check_annotation_type(
        &mut self,
        id: ClassId,
        diff: &ClassDiff,
        dependents: &[Dependency],
    ) -> StoreResult<bool> {
        if diff.annotation_semantics_changed {
            let mut visited = FxHashSet::default();
            visited.insert(id);
            self.mark_annotation_users(id, dependents, &mut visited)?;
            return Ok(true);
        }

        let reason = if diff
            .added_methods()
            .any(|method| method.annotation_default.is_none())
        {
            MarkReason::AnnotationMemberAdded(id)
        } else if !diff.removed.is_empty() {
            MarkReason::AnnotationMemberRemoved(id)
        } else if !diff.changed_fields.is_empty() || !diff.changed_methods.is_empty() {
            MarkReason::AnnotationMemberChanged(id)
        } else if diff.defaults_removed {
            MarkReason::AnnotationDefaultRemoved(id)
        } else if diff.targets_removed {
            MarkReason::AnnotationTargetsRemoved(id)
        } else if diff.retention_escalated {
            MarkReason::RetentionEscalated(id)
        } else {
            return Ok(false);
        };
        self.mark_all(dependents, reason);
        Ok(true)
    }

    /// Mark every user; users that are annotation types themselves pass the
    /// change on to their own users.
    fn mark_annotation_users(
        &mut self,
        origin: ClassId,
        dependents: &[Dependency],
        visited: &mut FxHashSet<ClassId>,
    ) -> StoreResult<()> {
        for dependency in dependents {
            let user = dependency.class;
            self.mark(user, MarkReason::AnnotationSemanticsChanged(origin));
            let is_annotation = self
                .old_view
                .record(user)?
                .is_some_and(|record| record.is_annotation());
            if is_annotation && visited.insert(user) {
                let nested = self.back_deps.dependencies(user)?;
                self.mark_annotation_users(user, &nested, visited)?;
            }
        }
        Ok(())
    }
}
