//! Structural difference between the old and new version of a class.

use jmake_ir::descriptor::{split_method_signature, strip_type_parameters};
use jmake_ir::{
    AnnotationTargets, AnnotationValue, ClassRecord, ConstantValue, FieldRecord, MemberRecord,
    MethodKey, MethodRecord, RetentionPolicy, Symbol, SymbolTable,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::well_known::WellKnown;

/// How one method changed between two versions with the same key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodChange {
    pub return_type_changed: bool,
    pub return_signature_changed: bool,
    pub params_signature_changed: bool,
    pub throws_changed: bool,
    pub static_changed: bool,
    pub access_restricted: bool,
    pub became_abstract: bool,
    pub removed_annotation_default: bool,
    pub flags_changed: bool,
}

impl MethodChange {
    pub fn between(old: &MethodRecord, new: &MethodRecord, symbols: &SymbolTable) -> Self {
        let (return_signature_changed, params_signature_changed) =
            signature_changes(old.generic_signature, new.generic_signature, symbols);
        MethodChange {
            return_type_changed: old.return_type != new.return_type,
            return_signature_changed,
            params_signature_changed,
            throws_changed: !old.same_thrown(new),
            static_changed: old.flags.is_static() != new.flags.is_static(),
            access_restricted: old.flags.is_more_accessible_than(new.flags),
            became_abstract: !old.is_abstract() && new.is_abstract(),
            removed_annotation_default: old.annotation_default.is_some()
                && new.annotation_default.is_none(),
            flags_changed: old.flags != new.flags,
        }
    }

    /// A structural change. A removed annotation default alone is tracked
    /// separately.
    pub fn is_changed(&self) -> bool {
        self.return_type_changed
            || self.return_signature_changed
            || self.params_signature_changed
            || self.throws_changed
            || self.static_changed
            || self.access_restricted
            || self.became_abstract
            || self.flags_changed
    }

    /// A change that invalidates code calling the method.
    pub fn affects_callers(&self) -> bool {
        self.return_type_changed
            || self.return_signature_changed
            || self.params_signature_changed
            || self.throws_changed
            || self.static_changed
            || self.access_restricted
    }
}

/// (return part changed, parameter part changed) of two generic method
/// signatures.
fn signature_changes(
    old: Option<Symbol>,
    new: Option<Symbol>,
    symbols: &SymbolTable,
) -> (bool, bool) {
    if old == new {
        return (false, false);
    }
    let (Some(old), Some(new)) = (
        old.and_then(|sig| symbols.resolve(sig)),
        new.and_then(|sig| symbols.resolve(sig)),
    ) else {
        return (true, true);
    };
    match (split_method_signature(&old), split_method_signature(&new)) {
        (Some((old_params, old_ret)), Some((new_params, new_ret))) => {
            (old_ret != new_ret, old_params != new_params)
        }
        _ => (true, true),
    }
}

/// Everything the analysis needs to know about how a class changed.
#[derive(Clone, Debug, Default)]
pub struct ClassDiff {
    /// Members of the new version whose key the old one lacks.
    pub added: Vec<MemberRecord>,
    /// Members of the old version whose key the new one lacks.
    pub removed: Vec<MemberRecord>,
    /// Old versions of fields whose descriptor, flags or signature changed.
    pub changed_fields: Vec<FieldRecord>,
    /// Old versions of changed methods.
    pub changed_methods: Vec<(MethodRecord, MethodChange)>,
    pub defaults_removed: bool,
    pub flags_changed: bool,
    /// Superclass replaced by something other than the root class.
    pub super_class_changed: bool,
    /// Superclass was the root class and now is not.
    pub super_class_added: bool,
    pub interface_added: bool,
    pub interface_removed: bool,
    pub superlist_signature_changed: bool,
    pub kind_changed: bool,
    pub became_final: bool,
    pub became_abstract: bool,
    pub access_restricted: bool,
    pub targets_removed: bool,
    pub retention_escalated: bool,
    pub annotation_semantics_changed: bool,
}

impl ClassDiff {
    pub(crate) fn compute(
        old: &ClassRecord,
        new: &ClassRecord,
        symbols: &SymbolTable,
        names: &WellKnown,
    ) -> Self {
        let mut diff = ClassDiff {
            flags_changed: old.flags != new.flags,
            kind_changed: old.is_interface() != new.is_interface(),
            became_final: !old.flags.is_final() && new.flags.is_final(),
            became_abstract: !old.flags.is_abstract() && new.flags.is_abstract(),
            access_restricted: old.flags.is_more_accessible_than(new.flags),
            ..ClassDiff::default()
        };
        diff.diff_fields(old, new);
        diff.diff_methods(old, new, symbols);
        diff.diff_superlist(old, new, symbols, names);

        diff.targets_removed = annotation_targets(old, symbols, names)
            .lost_any(annotation_targets(new, symbols, names));
        diff.retention_escalated =
            retention_policy(old, symbols, names).escalated_to(retention_policy(new, symbols, names));
        diff.annotation_semantics_changed = annotation_semantics_changed(old, new, names);
        diff
    }

    fn diff_fields(&mut self, old: &ClassRecord, new: &ClassRecord) {
        let old_fields: FxHashMap<Symbol, &FieldRecord> =
            old.fields.iter().map(|field| (field.name, field)).collect();
        let new_fields: FxHashMap<Symbol, &FieldRecord> =
            new.fields.iter().map(|field| (field.name, field)).collect();

        for field in &new.fields {
            if !old_fields.contains_key(&field.name) {
                self.added.push(MemberRecord::Field(field.clone()));
            }
        }
        for field in &old.fields {
            match new_fields.get(&field.name) {
                None => self.removed.push(MemberRecord::Field(field.clone())),
                Some(new_field) => {
                    if field.descriptor != new_field.descriptor
                        || field.flags != new_field.flags
                        || field.generic_signature != new_field.generic_signature
                    {
                        self.changed_fields.push(field.clone());
                    }
                }
            }
        }
    }

    fn diff_methods(&mut self, old: &ClassRecord, new: &ClassRecord, symbols: &SymbolTable) {
        let old_groups = group_methods(&old.methods);
        let new_groups = group_methods(&new.methods);

        for method in &new.methods {
            if !old_groups.contains_key(&method.key()) {
                self.added.push(MemberRecord::Method(method.clone()));
            }
        }
        for method in &old.methods {
            if !new_groups.contains_key(&method.key()) {
                self.removed.push(MemberRecord::Method(method.clone()));
            }
        }

        // Keys present on both sides, in declaration order of the old class.
        let mut seen = FxHashSet::default();
        for method in &old.methods {
            let key = method.key();
            if !seen.insert(key) {
                continue;
            }
            let (Some(olds), Some(news)) = (old_groups.get(&key), new_groups.get(&key)) else {
                continue;
            };
            // Covariant overloads: pair identical descriptors first, then
            // compare each leftover old overload with every leftover new one.
            let mut olds = olds.clone();
            let mut news = news.clone();
            olds.retain(|old_method| {
                let Some(pos) = news
                    .iter()
                    .position(|new_method| new_method.descriptor == old_method.descriptor)
                else {
                    return true;
                };
                let new_method = news.remove(pos);
                self.record_method_change(old_method, new_method, symbols);
                false
            });
            if news.is_empty() {
                self.removed
                    .extend(olds.iter().map(|&method| MemberRecord::Method(method.clone())));
                continue;
            }
            if olds.is_empty() {
                self.added
                    .extend(news.iter().map(|&method| MemberRecord::Method(method.clone())));
                continue;
            }
            for old_method in olds {
                let change = news
                    .iter()
                    .map(|new_method| MethodChange::between(old_method, new_method, symbols))
                    .find(MethodChange::is_changed);
                if let Some(change) = change {
                    self.defaults_removed |= change.removed_annotation_default;
                    self.changed_methods.push((old_method.clone(), change));
                }
            }
        }
    }

    fn record_method_change(&mut self, old: &MethodRecord, new: &MethodRecord, symbols: &SymbolTable) {
        let change = MethodChange::between(old, new, symbols);
        self.defaults_removed |= change.removed_annotation_default;
        if change.is_changed() {
            self.changed_methods.push((old.clone(), change));
        }
    }

    fn diff_superlist(
        &mut self,
        old: &ClassRecord,
        new: &ClassRecord,
        symbols: &SymbolTable,
        names: &WellKnown,
    ) {
        if old.super_class != new.super_class {
            if old.super_class == Some(names.object) {
                self.super_class_added = true;
            } else {
                self.super_class_changed = true;
            }
        }
        self.interface_added = new.interfaces.iter().any(|i| !old.interfaces.contains(i));
        self.interface_removed = old.interfaces.iter().any(|i| !new.interfaces.contains(i));
        self.superlist_signature_changed =
            superlist_signature_changed(old.generic_signature, new.generic_signature, symbols);
    }

    pub fn superlist_changed(&self) -> bool {
        self.super_class_changed
            || self.super_class_added
            || self.interface_added
            || self.interface_removed
            || self.superlist_signature_changed
    }

    /// Superlist changes that invalidate users of the whole hierarchy.
    pub fn superlist_invalidates(&self) -> bool {
        self.super_class_changed || self.interface_removed || self.superlist_signature_changed
    }

    /// Nothing the analysis reacts to.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed_fields.is_empty()
            && self.changed_methods.is_empty()
            && !self.defaults_removed
            && !self.flags_changed
            && !self.superlist_changed()
            && !self.targets_removed
            && !self.retention_escalated
            && !self.annotation_semantics_changed
    }

    pub fn added_methods(&self) -> impl Iterator<Item = &MethodRecord> {
        self.added.iter().filter_map(MemberRecord::as_method)
    }

    pub fn removed_methods(&self) -> impl Iterator<Item = &MethodRecord> {
        self.removed.iter().filter_map(MemberRecord::as_method)
    }

    pub fn added_fields(&self) -> impl Iterator<Item = &FieldRecord> {
        self.added.iter().filter_map(MemberRecord::as_field)
    }

    pub fn removed_fields(&self) -> impl Iterator<Item = &FieldRecord> {
        self.removed.iter().filter_map(MemberRecord::as_field)
    }

    pub fn is_removed_method(&self, name: Symbol, descriptor: Symbol) -> bool {
        self.removed_methods()
            .any(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn is_removed_field(&self, name: Symbol) -> bool {
        self.removed_fields().any(|field| field.name == name)
    }

    pub fn is_changed_field(&self, name: Symbol) -> bool {
        self.changed_fields.iter().any(|field| field.name == name)
    }

    pub fn method_change(&self, name: Symbol, descriptor: Symbol) -> Option<&MethodChange> {
        self.changed_methods
            .iter()
            .find(|(method, _)| method.name == name && method.descriptor == descriptor)
            .map(|(_, change)| change)
    }
}

fn group_methods(methods: &[MethodRecord]) -> FxHashMap<MethodKey, Vec<&MethodRecord>> {
    let mut groups: FxHashMap<MethodKey, Vec<&MethodRecord>> = FxHashMap::default();
    for method in methods {
        groups.entry(method.key()).or_default().push(method);
    }
    groups
}

/// Class signatures compared without their formal type parameters. A
/// signature appearing or disappearing counts as a change.
fn superlist_signature_changed(
    old: Option<Symbol>,
    new: Option<Symbol>,
    symbols: &SymbolTable,
) -> bool {
    if old == new {
        return false;
    }
    let (Some(old), Some(new)) = (
        old.and_then(|sig| symbols.resolve(sig)),
        new.and_then(|sig| symbols.resolve(sig)),
    ) else {
        return true;
    };
    strip_type_parameters(&old) != strip_type_parameters(&new)
}

/// Targets declared by `@Target`, or the default set without one.
fn annotation_targets(
    record: &ClassRecord,
    symbols: &SymbolTable,
    names: &WellKnown,
) -> AnnotationTargets {
    let Some(value) = record
        .annotations
        .find(names.target)
        .and_then(|target| target.member(names.value))
    else {
        return AnnotationTargets::DEFAULT;
    };
    let mut targets = AnnotationTargets::empty();
    let mut add = |item: &ConstantValue| {
        if let ConstantValue::Enum { constant, .. } = item {
            if let Some(target) = symbols
                .with_name(*constant, AnnotationTargets::from_element_type)
                .flatten()
            {
                targets |= target;
            }
        }
    };
    match value {
        ConstantValue::Array(items) => items.iter().for_each(&mut add),
        single => add(single),
    }
    targets
}

/// Policy declared by `@Retention`, CLASS without one.
fn retention_policy(
    record: &ClassRecord,
    symbols: &SymbolTable,
    names: &WellKnown,
) -> RetentionPolicy {
    record
        .annotations
        .find(names.retention)
        .and_then(|retention| retention.member(names.value))
        .and_then(|value| match value {
            ConstantValue::Enum { constant, .. } => {
                symbols.with_name(*constant, RetentionPolicy::from_name).flatten()
            }
            _ => None,
        })
        .unwrap_or_default()
}

/// Annotations on the class other than `@Retention` and `@Target` differ in
/// number or values.
fn annotation_semantics_changed(old: &ClassRecord, new: &ClassRecord, names: &WellKnown) -> bool {
    let relevant = |record: &ClassRecord| -> Vec<AnnotationValue> {
        record
            .annotations
            .iter()
            .filter(|value| value.annotation != names.retention && value.annotation != names.target)
            .cloned()
            .collect()
    };
    let old_values = relevant(old);
    let new_values = relevant(new);
    old_values.len() != new_values.len()
        || old_values.iter().any(|old_value| {
            !new_values.iter().any(|new_value| {
                new_value.annotation == old_value.annotation && new_value.same_values(old_value)
            })
        })
}
