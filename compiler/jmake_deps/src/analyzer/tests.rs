use std::sync::Arc;

use super::*;
use crate::config::EngineConfig;
use crate::graph::{GraphManager, Stores};
use jmake_ir::{AccessFlags, RawAnnotation, RawClass, RawConstant, RawField, RawMethod};
use jmake_store::StoreConfig;
use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;
use tempfile::TempDir;

/// A committed hierarchy plus one round of recompiled classes.
struct Fixture {
    _dir: TempDir,
    symbols: SymbolTable,
    names: WellKnown,
    stores: Stores,
    previous: FxHashMap<ClassId, Option<Arc<ClassRecord>>>,
    compiled: FxHashSet<ClassId>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let stores = Stores::open(dir.path(), &StoreConfig::default()).unwrap();
        let symbols = SymbolTable::in_memory();
        let names = WellKnown::intern(&symbols, &EngineConfig::new(dir.path())).unwrap();
        Fixture {
            _dir: dir,
            symbols,
            names,
            stores,
            previous: FxHashMap::default(),
            compiled: FxHashSet::default(),
        }
    }

    fn graph(&self) -> GraphManager<'_> {
        GraphManager {
            stores: &self.stores,
            symbols: &self.symbols,
            names: &self.names,
        }
    }

    fn commit(&self, raw: &RawClass) -> ClassId {
        let record = raw.intern(&self.symbols).unwrap();
        let id = record.id;
        let (stored, references) = record.without_references();
        self.stores.classes.put(id, stored.clone()).unwrap();
        let graph = self.graph();
        graph.add_forward_edges(&stored, &references).unwrap();
        graph.update_remote_flag(id).unwrap();
        graph.add_subclass_edges(&stored).unwrap();
        id
    }

    /// Replace a committed class with a new version, keeping the old one
    /// for the analysis.
    fn recompile(&mut self, raw: &RawClass) -> ClassId {
        let id = self.symbols.intern(&raw.name);
        let old = self.stores.classes.get(id).unwrap();
        self.graph().retract(id, old.as_deref()).unwrap();
        self.previous.insert(id, old);
        self.compiled.insert(id);
        self.commit(raw)
    }

    fn analyze(&self) -> RecompileSet {
        let old_view = OldView::new(&self.stores.classes, &self.previous);
        let mut marks = RecompileSet::excluding(self.compiled.iter().copied());
        let mut changed: Vec<ClassId> = self.compiled.iter().copied().collect();
        changed.sort_unstable();
        for id in changed {
            let old = self.previous[&id].clone().unwrap();
            let new = self.stores.classes.get(id).unwrap().unwrap();
            let diff = ClassDiff::compute(&old, &new, &self.symbols, &self.names);
            ChangeImpactAnalyzer {
                symbols: &self.symbols,
                names: &self.names,
                old_view: &old_view,
                current: &self.stores.classes,
                back_deps: &self.stores.back_deps,
                subclasses: &self.stores.subclasses,
                compiled: &self.compiled,
                oracle: None,
                marks: &mut marks,
            }
            .analyze(&old, &diff)
            .unwrap();
        }
        marks
    }

    fn id(&self, name: &str) -> ClassId {
        self.symbols.lookup(name).unwrap()
    }

    fn reason(&self, marks: &RecompileSet, name: &str) -> Option<MarkReason> {
        marks.reason(self.id(name))
    }

    fn marked(&self, marks: RecompileSet) -> Vec<String> {
        let mut names: Vec<String> = marks
            .into_sorted()
            .into_iter()
            .map(|id| self.symbols.display_name(id))
            .collect();
        names.sort();
        names
    }
}

fn public(name: &str, descriptor: &str) -> RawMethod {
    RawMethod::new(name, descriptor, AccessFlags::PUBLIC)
}

const PUBLIC_ABSTRACT: AccessFlags = AccessFlags::PUBLIC.union(AccessFlags::ABSTRACT);

#[test]
fn test_unchanged_class_marks_nothing() {
    let mut fx = Fixture::new();
    let a = RawClass::class("p.A").method(public("m", "()V"));
    fx.commit(&a);
    fx.commit(&RawClass::class("p.B").uses_method("p.A", "m", "()V"));
    fx.recompile(&a);
    assert!(fx.analyze().is_empty());
}

#[test]
fn test_removed_method_marks_callers_only() {
    let mut fx = Fixture::new();
    fx.commit(
        &RawClass::class("p.A")
            .method(public("m", "()V"))
            .method(public("n", "()V")),
    );
    fx.commit(&RawClass::class("p.B").uses_method("p.A", "m", "()V"));
    fx.commit(&RawClass::class("p.C").uses_method("p.A", "n", "()V"));
    fx.recompile(&RawClass::class("p.A").method(public("n", "()V")));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.B"]);
}

#[test]
fn test_changed_return_type_marks_callers() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A").method(public("size", "()I")));
    fx.commit(&RawClass::class("p.B").uses_method("p.A", "size", "()I"));
    fx.recompile(&RawClass::class("p.A").method(public("size", "()J")));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.B"]);
}

#[test]
fn test_compiled_classes_are_never_marked() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A").method(public("m", "()V")));
    let b = RawClass::class("p.B").uses_method("p.A", "m", "()V");
    fx.commit(&b);
    fx.recompile(&RawClass::class("p.A"));
    fx.recompile(&b);

    assert!(fx.analyze().is_empty());
}

#[test]
fn test_abstract_method_added_to_interface_marks_implementors() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::interface("p.I"));
    fx.commit(&RawClass::class("p.X").implements("p.I"));
    fx.commit(&RawClass::class("p.Y").extends("p.X"));
    fx.commit(&RawClass::class("p.Unrelated"));
    fx.recompile(&RawClass::interface("p.I").method(RawMethod::new("run", "()V", PUBLIC_ABSTRACT)));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.X", "p.Y"]);
}

#[test]
fn test_superclass_change_marks_users_of_subclasses() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.Base"));
    fx.commit(&RawClass::class("p.Other"));
    fx.commit(&RawClass::class("p.A").extends("p.Base"));
    fx.commit(&RawClass::class("p.Sub").extends("p.A"));
    fx.commit(&RawClass::class("p.User").uses_class("p.Sub"));
    fx.recompile(&RawClass::class("p.A").extends("p.Other"));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.Sub", "p.User"]);
}

#[test]
fn test_became_final_marks_users_and_subclasses() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A"));
    fx.commit(&RawClass::class("p.B").extends("p.A"));
    fx.commit(&RawClass::class("p.User").uses_class("p.A"));
    fx.recompile(&RawClass::class("p.A").with_flags(AccessFlags::PUBLIC | AccessFlags::FINAL));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.B", "p.User"]);
}

#[test]
fn test_became_abstract_marks_instantiating_users() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A").method(RawMethod::constructor("()V")));
    fx.commit(&RawClass::class("p.Maker").uses_method("p.A", "<init>", "()V"));
    fx.commit(&RawClass::class("p.Holder").uses_class("p.A"));
    fx.recompile(
        &RawClass::class("p.A")
            .with_flags(PUBLIC_ABSTRACT)
            .method(RawMethod::constructor("()V")),
    );

    assert_eq!(fx.marked(fx.analyze()), vec!["p.Maker"]);
}

#[test]
fn test_added_field_hidden_by_subclass() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A"));
    fx.commit(&RawClass::class("p.B").extends("p.A").field(RawField::new(
        "count",
        "I",
        AccessFlags::PUBLIC,
    )));
    fx.commit(&RawClass::class("p.C").extends("p.A"));
    fx.recompile(&RawClass::class("p.A").field(RawField::new("count", "J", AccessFlags::PUBLIC)));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.B"]);
}

#[test]
fn test_added_field_collides_with_superclass_field_access() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.Base").field(RawField::new("f", "I", AccessFlags::PUBLIC)));
    fx.commit(&RawClass::class("p.A").extends("p.Base"));
    fx.commit(&RawClass::class("p.User").uses_field("p.Base", "f"));
    fx.recompile(
        &RawClass::class("p.A")
            .extends("p.Base")
            .field(RawField::new("f", "I", AccessFlags::PUBLIC)),
    );

    assert_eq!(fx.marked(fx.analyze()), vec!["p.User"]);
}

#[test]
fn test_added_overload_marks_callers_in_superclass() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A").method(public("put", "(Ljava/lang/Object;)V")));
    fx.commit(&RawClass::class("p.B").extends("p.A"));
    fx.commit(&RawClass::class("p.User").uses_method("p.B", "put", "(Ljava/lang/Object;)V"));
    fx.recompile(
        &RawClass::class("p.B")
            .extends("p.A")
            .method(public("put", "(Ljava/lang/String;)V")),
    );

    assert_eq!(fx.marked(fx.analyze()), vec!["p.User"]);
}

#[test]
fn test_removed_implementation_exposes_abstract_method() {
    let mut fx = Fixture::new();
    fx.commit(
        &RawClass::class("p.Base")
            .with_flags(PUBLIC_ABSTRACT)
            .method(RawMethod::new("m", "()V", PUBLIC_ABSTRACT)),
    );
    fx.commit(
        &RawClass::class("p.A")
            .with_flags(PUBLIC_ABSTRACT)
            .extends("p.Base")
            .method(public("m", "()V")),
    );
    fx.commit(&RawClass::class("p.C").extends("p.A"));
    fx.recompile(
        &RawClass::class("p.A")
            .with_flags(PUBLIC_ABSTRACT)
            .extends("p.Base"),
    );

    assert_eq!(fx.marked(fx.analyze()), vec!["p.C"]);
}

#[test]
fn test_removed_method_with_concrete_fallback_keeps_subclass() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.Base").method(public("m", "()V")));
    fx.commit(&RawClass::class("p.A").extends("p.Base").method(public("m", "()V")));
    fx.commit(&RawClass::class("p.C").extends("p.A"));
    fx.recompile(&RawClass::class("p.A").extends("p.Base"));

    assert!(fx.analyze().is_empty());
}

#[test]
fn test_removed_overridable_method_marks_overriding_subclass() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A").method(public("hook", "()V")));
    fx.commit(&RawClass::class("p.B").extends("p.A").method(public("hook", "()V")));
    fx.commit(&RawClass::class("p.C").extends("p.A"));
    fx.recompile(&RawClass::class("p.A"));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.B"]);
}

#[test]
fn test_incompatible_override_of_added_method() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A"));
    fx.commit(
        &RawClass::class("p.B")
            .extends("p.A")
            .method(RawMethod::new("m", "()V", AccessFlags::PROTECTED)),
    );
    fx.commit(&RawClass::class("p.C").extends("p.A").method(public("m", "()V")));
    fx.recompile(&RawClass::class("p.A").method(public("m", "()V")));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.B"]);
}

#[test]
fn test_annotation_member_without_default_marks_users() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::annotation_type("p.Ann"));
    fx.commit(&RawClass::class("p.User").annotate(RawAnnotation::new("p.Ann")));
    fx.recompile(&RawClass::annotation_type("p.Ann").method(RawMethod::new(
        "level",
        "()I",
        PUBLIC_ABSTRACT,
    )));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.User"]);
}

#[test]
fn test_annotation_member_with_default_is_compatible() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::annotation_type("p.Ann"));
    fx.commit(&RawClass::class("p.User").annotate(RawAnnotation::new("p.Ann")));
    fx.recompile(
        &RawClass::annotation_type("p.Ann").method(
            RawMethod::new("level", "()I", PUBLIC_ABSTRACT).with_default(RawConstant::Int(1)),
        ),
    );

    assert!(fx.analyze().is_empty());
}

#[test]
fn test_annotation_semantics_change_cascades_through_meta_annotations() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::annotation_type("p.Meta"));
    fx.commit(&RawClass::annotation_type("p.Ann").annotate(RawAnnotation::new("p.Meta")));
    fx.commit(&RawClass::class("p.User").annotate(RawAnnotation::new("p.Ann")));
    fx.commit(&RawClass::class("p.Bystander"));
    fx.recompile(
        &RawClass::annotation_type("p.Meta")
            .annotate(RawAnnotation::new("java.lang.annotation.Documented")),
    );

    assert_eq!(fx.marked(fx.analyze()), vec!["p.Ann", "p.User"]);
}

#[test]
fn test_kind_change_marks_users_of_hierarchy() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A"));
    fx.commit(&RawClass::class("p.B").extends("p.A"));
    fx.commit(&RawClass::class("p.User").uses_class("p.A"));
    fx.commit(&RawClass::class("p.UserOfB").uses_class("p.B"));
    fx.commit(&RawClass::class("p.Bystander"));
    fx.recompile(&RawClass::interface("p.A"));

    let a = fx.id("p.A");
    let marks = fx.analyze();
    assert_eq!(fx.reason(&marks, "p.UserOfB"), Some(MarkReason::KindChanged(a)));
    assert_eq!(fx.marked(marks), vec!["p.B", "p.User", "p.UserOfB"]);
}

#[test]
fn test_class_access_restriction_marks_every_user() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A").method(public("m", "()V")));
    fx.commit(&RawClass::class("p.B").uses_method("p.A", "m", "()V"));
    fx.commit(&RawClass::class("p.User").uses_class("p.A"));
    fx.commit(&RawClass::class("p.Bystander"));
    fx.recompile(
        &RawClass::class("p.A")
            .with_flags(AccessFlags::empty())
            .method(public("m", "()V")),
    );

    let a = fx.id("p.A");
    let marks = fx.analyze();
    assert_eq!(fx.reason(&marks, "p.B"), Some(MarkReason::AccessRestricted(a)));
    assert_eq!(fx.reason(&marks, "p.User"), Some(MarkReason::AccessRestricted(a)));
    assert_eq!(fx.marked(marks), vec!["p.B", "p.User"]);
}

/// Erasure-level check: the subclass is marked even where the compiler
/// would accept it, which keeps the rule conservative.
#[test]
fn test_added_generic_method_clashes_with_subclass_erasure() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A"));
    fx.commit(
        &RawClass::class("p.B")
            .extends("p.A")
            .method(public("put", "(Ljava/lang/Object;)V")),
    );
    fx.commit(&RawClass::class("p.C").extends("p.A"));
    fx.recompile(
        &RawClass::class("p.A").method(
            public("put", "(Ljava/lang/Object;)V").with_signature("<T:Ljava/lang/Object;>(TT;)V"),
        ),
    );

    let a = fx.id("p.A");
    let marks = fx.analyze();
    assert_eq!(fx.reason(&marks, "p.B"), Some(MarkReason::GenericsNameClash(a)));
    assert_eq!(fx.marked(marks), vec!["p.B"]);
}

#[test]
fn test_changed_method_marks_overriding_subclass() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A").method(public("m", "()V")));
    fx.commit(&RawClass::class("p.B").extends("p.A").method(public("m", "()V")));
    fx.commit(&RawClass::class("p.C").extends("p.A"));
    fx.recompile(&RawClass::class("p.A").method(public("m", "()V").throws("java.io.IOException")));

    let a = fx.id("p.A");
    let marks = fx.analyze();
    assert_eq!(fx.reason(&marks, "p.B"), Some(MarkReason::OverridesChangedMethod(a)));
    assert_eq!(fx.marked(marks), vec!["p.B"]);
}

#[test]
fn test_changed_method_marks_subclass_whose_interface_declares_it() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::interface("p.I").method(RawMethod::new("m", "()V", PUBLIC_ABSTRACT)));
    fx.commit(&RawClass::class("p.A").method(public("m", "()V")));
    fx.commit(&RawClass::class("p.D").extends("p.A").implements("p.I"));
    fx.commit(&RawClass::class("p.E").extends("p.A"));
    fx.recompile(&RawClass::class("p.A").method(public("m", "()V").throws("java.io.IOException")));

    let a = fx.id("p.A");
    let marks = fx.analyze();
    assert_eq!(fx.reason(&marks, "p.D"), Some(MarkReason::OverridesChangedMethod(a)));
    assert_eq!(fx.marked(marks), vec!["p.D"]);
}

#[test]
fn test_method_made_abstract_marks_concrete_subclasses() {
    let mut fx = Fixture::new();
    fx.commit(
        &RawClass::class("p.A")
            .with_flags(PUBLIC_ABSTRACT)
            .method(public("m", "()V")),
    );
    fx.commit(&RawClass::class("p.B").extends("p.A"));
    fx.commit(&RawClass::class("p.C").with_flags(PUBLIC_ABSTRACT).extends("p.A"));
    fx.commit(&RawClass::class("p.User").uses_method("p.A", "m", "()V"));
    fx.recompile(
        &RawClass::class("p.A")
            .with_flags(PUBLIC_ABSTRACT)
            .method(RawMethod::new("m", "()V", PUBLIC_ABSTRACT)),
    );

    let a = fx.id("p.A");
    let marks = fx.analyze();
    assert_eq!(fx.reason(&marks, "p.B"), Some(MarkReason::InheritsAbstractMethod(a)));
    assert_eq!(fx.marked(marks), vec!["p.B"]);
}

#[test]
fn test_added_interface_marks_all_subclasses() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::interface("p.I"));
    fx.commit(&RawClass::class("p.A"));
    fx.commit(&RawClass::class("p.B").extends("p.A"));
    fx.commit(&RawClass::class("p.C").extends("p.B"));
    fx.commit(&RawClass::class("p.User").uses_class("p.A"));
    fx.recompile(&RawClass::class("p.A").implements("p.I"));

    let a = fx.id("p.A");
    let marks = fx.analyze();
    assert_eq!(fx.reason(&marks, "p.B"), Some(MarkReason::SuperlistExtended(a)));
    assert_eq!(fx.reason(&marks, "p.C"), Some(MarkReason::SuperlistExtended(a)));
    assert_eq!(fx.marked(marks), vec!["p.B", "p.C"]);
}

#[test]
fn test_became_final_skips_indirect_subclasses() {
    let mut fx = Fixture::new();
    fx.commit(&RawClass::class("p.A"));
    fx.commit(&RawClass::class("p.B").extends("p.A"));
    fx.commit(&RawClass::class("p.C").extends("p.B"));
    fx.commit(&RawClass::class("p.User").uses_class("p.A"));
    fx.recompile(&RawClass::class("p.A").with_flags(AccessFlags::PUBLIC | AccessFlags::FINAL));

    assert_eq!(fx.marked(fx.analyze()), vec!["p.B", "p.User"]);
}

#[test]
fn test_became_final_marks_direct_subclass_through_hierarchy() {
    let mut fx = Fixture::new();
    let a = fx.commit(&RawClass::class("p.A"));
    let b = fx.commit(&RawClass::class("p.B").extends("p.A"));
    fx.commit(&RawClass::class("p.C").extends("p.B"));
    // Only the subclass walk reaches B.
    fx.stores.back_deps.remove_referencer(a, b).unwrap();
    fx.recompile(&RawClass::class("p.A").with_flags(AccessFlags::PUBLIC | AccessFlags::FINAL));

    let marks = fx.analyze();
    assert_eq!(marks.reason(b), Some(MarkReason::ExtendsFinal(a)));
    assert_eq!(fx.marked(marks), vec!["p.B"]);
}

#[test]
fn test_methods_removed_from_remote_interface_mark_implementors() {
    let mut fx = Fixture::new();
    fx.commit(
        &RawClass::interface("p.S")
            .implements("java.rmi.Remote")
            .method(RawMethod::new("ping", "()V", PUBLIC_ABSTRACT))
            .method(RawMethod::new("pong", "()V", PUBLIC_ABSTRACT)),
    );
    fx.commit(
        &RawClass::class("p.Impl")
            .implements("p.S")
            .method(public("ping", "()V"))
            .method(public("pong", "()V")),
    );
    fx.commit(&RawClass::interface("p.Sub").implements("p.S"));
    let s = fx.id("p.S");
    assert!(fx.stores.classes.get(s).unwrap().unwrap().remote);
    fx.recompile(
        &RawClass::interface("p.S")
            .implements("java.rmi.Remote")
            .method(RawMethod::new("ping", "()V", PUBLIC_ABSTRACT)),
    );

    let marks = fx.analyze();
    assert_eq!(fx.reason(&marks, "p.Impl"), Some(MarkReason::RemoteMethodsRemoved(s)));
    assert_eq!(fx.marked(marks), vec!["p.Impl"]);
}
