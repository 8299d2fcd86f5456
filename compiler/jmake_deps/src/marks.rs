//! Classes selected for recompilation, and why.

use std::fmt;

use std::collections::hash_map::Entry;

use jmake_ir::{ClassId, Symbol, SymbolTable};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Why a class was marked. Each reason names the changed class it was
/// derived from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MarkReason {
    AnnotationSemanticsChanged(ClassId),
    AnnotationMemberAdded(ClassId),
    AnnotationMemberRemoved(ClassId),
    AnnotationMemberChanged(ClassId),
    AnnotationDefaultRemoved(ClassId),
    AnnotationTargetsRemoved(ClassId),
    RetentionEscalated(ClassId),
    SuperlistChanged(ClassId),
    KindChanged(ClassId),
    BecameFinal(ClassId),
    AccessRestricted(ClassId),
    ConstructsAbstract(ClassId),
    UsesRemovedMember(ClassId),
    UsesChangedMember(ClassId),
    AmbiguousOverload(ClassId),
    RemoteMethodsRemoved(ClassId),
    SuperlistExtended(ClassId),
    ExtendsFinal(ClassId),
    AbstractMethodAdded(ClassId),
    IncompatibleOverride(ClassId),
    GenericsNameClash(ClassId),
    HidesAddedField(ClassId),
    InheritsAbstractMethod(ClassId),
    OverridesChangedMethod(ClassId),
    UnimplementedAbstractMethod(ClassId),
    OverridesRemovedMethod(ClassId),
    FieldNameCollision(ClassId),
    OverloadCollision(ClassId),
    ClassRemoved(ClassId),
    ConstantChanged { class: ClassId, field: Symbol },
    AnnotationSourceUse(ClassId),
}

impl MarkReason {
    /// The changed class this reason derives from.
    pub fn origin(self) -> ClassId {
        match self {
            MarkReason::AnnotationSemanticsChanged(class)
            | MarkReason::AnnotationMemberAdded(class)
            | MarkReason::AnnotationMemberRemoved(class)
            | MarkReason::AnnotationMemberChanged(class)
            | MarkReason::AnnotationDefaultRemoved(class)
            | MarkReason::AnnotationTargetsRemoved(class)
            | MarkReason::RetentionEscalated(class)
            | MarkReason::SuperlistChanged(class)
            | MarkReason::KindChanged(class)
            | MarkReason::BecameFinal(class)
            | MarkReason::AccessRestricted(class)
            | MarkReason::ConstructsAbstract(class)
            | MarkReason::UsesRemovedMember(class)
            | MarkReason::UsesChangedMember(class)
            | MarkReason::AmbiguousOverload(class)
            | MarkReason::RemoteMethodsRemoved(class)
            | MarkReason::SuperlistExtended(class)
            | MarkReason::ExtendsFinal(class)
            | MarkReason::AbstractMethodAdded(class)
            | MarkReason::IncompatibleOverride(class)
            | MarkReason::GenericsNameClash(class)
            | MarkReason::HidesAddedField(class)
            | MarkReason::InheritsAbstractMethod(class)
            | MarkReason::OverridesChangedMethod(class)
            | MarkReason::UnimplementedAbstractMethod(class)
            | MarkReason::OverridesRemovedMethod(class)
            | MarkReason::FieldNameCollision(class)
            | MarkReason::OverloadCollision(class)
            | MarkReason::ClassRemoved(class)
            | MarkReason::ConstantChanged { class, .. }
            | MarkReason::AnnotationSourceUse(class) => class,
        }
    }

    fn summary(self) -> &'static str {
        match self {
            MarkReason::AnnotationSemanticsChanged(_) => "annotation values changed on",
            MarkReason::AnnotationMemberAdded(_) => "member without default added to",
            MarkReason::AnnotationMemberRemoved(_) => "member removed from annotation",
            MarkReason::AnnotationMemberChanged(_) => "member type changed in annotation",
            MarkReason::AnnotationDefaultRemoved(_) => "member default removed from",
            MarkReason::AnnotationTargetsRemoved(_) => "targets removed from",
            MarkReason::RetentionEscalated(_) => "retention policy escalated on",
            MarkReason::SuperlistChanged(_) => "superlist changed on",
            MarkReason::KindChanged(_) => "class/interface kind changed on",
            MarkReason::BecameFinal(_) => "became final:",
            MarkReason::AccessRestricted(_) => "access restricted on",
            MarkReason::ConstructsAbstract(_) => "instantiates now-abstract",
            MarkReason::UsesRemovedMember(_) => "uses member removed from",
            MarkReason::UsesChangedMember(_) => "uses member changed in",
            MarkReason::AmbiguousOverload(_) => "calls overload changed in",
            MarkReason::RemoteMethodsRemoved(_) => "methods removed from remote interface",
            MarkReason::SuperlistExtended(_) => "supertypes added to",
            MarkReason::ExtendsFinal(_) => "extends now-final",
            MarkReason::AbstractMethodAdded(_) => "abstract method added to",
            MarkReason::IncompatibleOverride(_) => "overrides incompatibly a method added to",
            MarkReason::GenericsNameClash(_) => "name clash with a method added to",
            MarkReason::HidesAddedField(_) => "hides field added to",
            MarkReason::InheritsAbstractMethod(_) => "inherits method made abstract in",
            MarkReason::OverridesChangedMethod(_) => "overrides method changed in",
            MarkReason::UnimplementedAbstractMethod(_) => "lacks implementation after change to",
            MarkReason::OverridesRemovedMethod(_) => "overrides method removed from",
            MarkReason::FieldNameCollision(_) => "field name collision near",
            MarkReason::OverloadCollision(_) => "overload resolution changed near",
            MarkReason::ClassRemoved(_) => "depends on removed class",
            MarkReason::ConstantChanged { .. } => "inlines constant changed in",
            MarkReason::AnnotationSourceUse(_) => "annotated with",
        }
    }

    /// Displayable form with names resolved through `symbols`.
    pub fn display(self, symbols: &SymbolTable) -> ReasonDisplay<'_> {
        ReasonDisplay {
            reason: self,
            symbols,
        }
    }
}

pub struct ReasonDisplay<'a> {
    reason: MarkReason,
    symbols: &'a SymbolTable,
}

impl fmt::Display for ReasonDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = self.symbols.display_name(self.reason.origin());
        write!(f, "{} {origin}", self.reason.summary())?;
        if let MarkReason::ConstantChanged { field, .. } = self.reason {
            write!(f, ".{}", self.symbols.display_name(field))?;
        }
        Ok(())
    }
}

/// The set of classes needing recompilation in one round.
///
/// Marking is idempotent and keeps the first reason. Excluded classes
/// (compiled this round or removed) are never marked.
#[derive(Debug, Default)]
pub struct RecompileSet {
    marked: FxHashMap<ClassId, MarkReason>,
    excluded: FxHashSet<ClassId>,
}

impl RecompileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluding(excluded: impl IntoIterator<Item = ClassId>) -> Self {
        RecompileSet {
            marked: FxHashMap::default(),
            excluded: excluded.into_iter().collect(),
        }
    }

    /// Mark `class`. Returns `true` if it was not marked before.
    pub fn mark(&mut self, class: ClassId, reason: MarkReason, symbols: &SymbolTable) -> bool {
        if self.excluded.contains(&class) {
            return false;
        }
        let Entry::Vacant(slot) = self.marked.entry(class) else {
            return false;
        };
        slot.insert(reason);
        debug!(
            class = %symbols.display_name(class),
            reason = %reason.display(symbols),
            "marked for recompilation"
        );
        true
    }

    #[inline]
    pub fn is_marked(&self, class: ClassId) -> bool {
        self.marked.contains_key(&class)
    }

    /// Why `class` was first marked.
    pub fn reason(&self, class: ClassId) -> Option<MarkReason> {
        self.marked.get(&class).copied()
    }

    #[inline]
    pub fn is_excluded(&self, class: ClassId) -> bool {
        self.excluded.contains(&class)
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    /// Marked classes in id order.
    pub fn into_sorted(self) -> Vec<ClassId> {
        let mut classes: Vec<ClassId> = self.marked.into_keys().collect();
        classes.sort_unstable();
        classes
    }
}
