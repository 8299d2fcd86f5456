#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Build rounds driven through the public engine API.
//!
//! Each test runs a first round that compiles everything from scratch, then
//! one or more incremental rounds, and checks which classes the engine asks
//! to recompile.

use std::path::PathBuf;
use std::sync::Arc;

use jmake_deps::{
    DeclaredMethod, DependencyEngine, DependentClasses, EngineConfig, MethodPattern,
    SearchCancelled, SourceUsage, UsageOracle,
};
use jmake_ir::{
    AccessFlags, ClassId, RawAnnotation, RawClass, RawConstant, RawField, RawMethod,
    ReferencerRecord,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[derive(Default)]
struct OracleState {
    field_usages: Vec<(String, String, SourceUsage)>,
    annotation_usages: Vec<(String, SourceUsage)>,
    abstract_methods: Vec<(String, String)>,
    cancel: bool,
    queries: Vec<String>,
}

/// Source search over a hand-written index. Clones share the index so a
/// test can keep a handle after giving one to the engine.
#[derive(Clone, Default)]
struct FakeOracle {
    state: Arc<Mutex<OracleState>>,
}

impl FakeOracle {
    fn field_usage(&self, owner: &str, field: &str, user: &str) {
        let mut state = self.state.lock();
        let handle = state.field_usages.len() as u64;
        state.field_usages.push((
            owner.to_string(),
            field.to_string(),
            SourceUsage {
                enclosing_class: user.to_string(),
                handle,
            },
        ));
    }

    fn annotation_usage(&self, annotation: &str, user: &str) {
        let mut state = self.state.lock();
        let handle = 1000 + state.annotation_usages.len() as u64;
        state.annotation_usages.push((
            annotation.to_string(),
            SourceUsage {
                enclosing_class: user.to_string(),
                handle,
            },
        ));
    }

    fn abstract_method(&self, class: &str, name: &str) {
        self.state
            .lock()
            .abstract_methods
            .push((class.to_string(), name.to_string()));
    }

    fn cancel_searches(&self) {
        self.state.lock().cancel = true;
    }

    fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }
}

impl UsageOracle for FakeOracle {
    fn find_field_usages(
        &self,
        owner: &str,
        field: &str,
    ) -> Result<Vec<SourceUsage>, SearchCancelled> {
        let mut state = self.state.lock();
        state.queries.push(format!("field {owner}.{field}"));
        if state.cancel {
            return Err(SearchCancelled);
        }
        Ok(state
            .field_usages
            .iter()
            .filter(|(o, f, _)| o == owner && f == field)
            .map(|(_, _, usage)| usage.clone())
            .collect())
    }

    fn find_annotation_usages(&self, annotation: &str) -> Result<Vec<SourceUsage>, SearchCancelled> {
        let mut state = self.state.lock();
        state.queries.push(format!("annotation {annotation}"));
        if state.cancel {
            return Err(SearchCancelled);
        }
        Ok(state
            .annotation_usages
            .iter()
            .filter(|(a, _)| a == annotation)
            .map(|(_, usage)| usage.clone())
            .collect())
    }

    fn resolve(&self, _usage: &SourceUsage) -> Result<bool, SearchCancelled> {
        Ok(true)
    }

    fn find_method(
        &self,
        class: &str,
        pattern: &MethodPattern,
    ) -> Result<Option<DeclaredMethod>, SearchCancelled> {
        let mut state = self.state.lock();
        state.queries.push(format!("method {class} {pattern}"));
        let found = state
            .abstract_methods
            .iter()
            .any(|(c, name)| c == class && *name == pattern.name);
        Ok(found.then_some(DeclaredMethod { is_abstract: true }))
    }
}

struct Project {
    dir: TempDir,
    engine: DependencyEngine,
}

impl Project {
    fn new() -> Self {
        jmake_deps::init_tracing();
        let dir = TempDir::new().unwrap();
        let engine = DependencyEngine::open(EngineConfig::new(dir.path().join("cache"))).unwrap();
        Project { dir, engine }
    }

    fn with_oracle(oracle: &FakeOracle) -> Self {
        let mut project = Project::new();
        project.engine.set_oracle(oracle.clone());
        project
    }

    /// Compile `classes` and return what else must be recompiled.
    fn round(&mut self, classes: &[RawClass]) -> DependentClasses {
        let ids: Vec<ClassId> = classes
            .iter()
            .map(|raw| self.engine.import_class(raw).unwrap())
            .collect();
        self.engine.update(&ids).unwrap();
        self.engine.find_dependent_classes().unwrap()
    }

    fn id(&self, name: &str) -> ClassId {
        self.engine.class_id(name).unwrap()
    }

    fn names(&self, result: &DependentClasses) -> Vec<String> {
        let mut names: Vec<String> = result
            .classes
            .iter()
            .map(|&id| self.engine.symbols().display_name(id))
            .collect();
        names.sort();
        names
    }

    fn reopen(self) -> Self {
        let Project { dir, engine } = self;
        engine.dispose().unwrap();
        let engine = DependencyEngine::open(EngineConfig::new(dir.path().join("cache"))).unwrap();
        Project { dir, engine }
    }
}

fn sourced(raw: RawClass) -> RawClass {
    let simple = raw.name.rsplit('.').next().unwrap_or_default().to_string();
    let path = PathBuf::from("src").join(format!("{simple}.java"));
    raw.source(format!("{simple}.java"), path)
}

const PUBLIC_FINAL: AccessFlags = AccessFlags::PUBLIC.union(AccessFlags::FINAL);
const PUBLIC_ABSTRACT: AccessFlags = AccessFlags::PUBLIC.union(AccessFlags::ABSTRACT);

#[test]
fn first_round_marks_nothing() {
    let mut project = Project::new();
    let result = project.round(&[
        RawClass::class("p.A").method(RawMethod::new("m", "()V", PUBLIC_FINAL)),
        RawClass::class("p.B").uses_method("p.A", "m", "()V"),
    ]);
    assert_eq!(result, DependentClasses::default());
}

#[test]
fn self_references_are_not_dependencies() {
    let mut project = Project::new();
    project.round(&[RawClass::class("p.A")
        .method(RawMethod::new("m", "()V", AccessFlags::PUBLIC))
        .uses_method("p.A", "m", "()V")
        .uses_class("p.A")]);
    let a = project.id("p.A");
    assert!(project.engine.back_dependencies(a).unwrap().is_empty());
    assert!(project.engine.referenced_classes(a).unwrap().is_empty());
}

#[test]
fn removing_a_method_marks_its_callers() {
    let mut project = Project::new();
    project.round(&[
        sourced(RawClass::class("p.A").method(RawMethod::new("m", "()V", PUBLIC_FINAL))),
        sourced(RawClass::class("p.B").uses_method("p.A", "m", "()V")),
        sourced(RawClass::class("p.C").uses_class("p.A")),
    ]);
    let b = project.id("p.B");
    assert_eq!(
        project.engine.back_dependencies(project.id("p.A")).unwrap().len(),
        2
    );

    let result = project.round(&[sourced(RawClass::class("p.A"))]);
    assert_eq!(result.classes, vec![b]);
    assert_eq!(result.files, vec![PathBuf::from("src/B.java")]);
}

#[test]
fn abstract_method_on_interface_marks_transitive_implementors() {
    let mut project = Project::new();
    project.round(&[
        RawClass::interface("p.A"),
        RawClass::class("p.B").implements("p.A"),
        RawClass::class("p.C").extends("p.B"),
        RawClass::class("p.D"),
    ]);
    let a = project.id("p.A");
    let mut implementors: Vec<ClassId> = project.engine.subclasses(a).unwrap().into_iter().collect();
    implementors.sort_unstable();
    assert_eq!(implementors, vec![project.id("p.B"), project.id("p.C")]);

    let result = project.round(&[
        RawClass::interface("p.A").method(RawMethod::new("run", "()V", PUBLIC_ABSTRACT)),
    ]);
    assert_eq!(project.names(&result), vec!["p.B", "p.C"]);
}

#[test]
fn escalated_retention_marks_source_users() {
    let oracle = FakeOracle::default();
    oracle.annotation_usage("p.Ann", "p.C");
    let mut project = Project::with_oracle(&oracle);
    let retention = |policy: &str| {
        RawAnnotation::new("java.lang.annotation.Retention")
            .member("value", RawConstant::retention(policy))
    };
    project.round(&[
        RawClass::annotation_type("p.Ann").annotate(retention("SOURCE")),
        RawClass::class("p.C"),
    ]);

    let result =
        project.round(&[RawClass::annotation_type("p.Ann").annotate(retention("RUNTIME"))]);
    assert_eq!(project.names(&result), vec!["p.C"]);
    assert!(oracle.queries().contains(&"annotation p.Ann".to_string()));
}

#[test]
fn deleting_a_class_marks_its_users_and_subclasses() {
    let mut project = Project::new();
    project.round(&[
        RawClass::class("p.A").method(RawMethod::new("m", "()V", AccessFlags::PUBLIC)),
        RawClass::class("p.B").uses_method("p.A", "m", "()V"),
        RawClass::class("p.C").extends("p.A"),
        RawClass::class("p.D").extends("p.C"),
        RawClass::class("p.E"),
    ]);
    let a = project.id("p.A");

    project.engine.mark_source_removed(a);
    project.engine.update(&[]).unwrap();
    assert!(!project.engine.all_ids().contains(&a));
    assert!(project.engine.class_record(a).unwrap().is_none());

    let result = project.engine.find_dependent_classes().unwrap();
    assert_eq!(project.names(&result), vec!["p.B", "p.C", "p.D"]);
}

#[test]
fn changed_constant_marks_inlining_users() {
    let oracle = FakeOracle::default();
    oracle.field_usage("p.Limits", "MAX", "p.User");
    let mut project = Project::with_oracle(&oracle);
    let flags = AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL;
    let limits = |value: i32| {
        RawClass::class("p.Limits")
            .field(RawField::new("MAX", "I", flags).with_constant(RawConstant::Int(value)))
    };
    project.round(&[limits(10), RawClass::class("p.User")]);

    let unchanged = project.round(&[limits(10)]);
    assert!(unchanged.classes.is_empty());
    assert!(oracle.queries().is_empty());

    let changed = project.round(&[limits(20)]);
    assert_eq!(project.names(&changed), vec!["p.User"]);
    assert_eq!(oracle.queries(), vec!["field p.Limits.MAX".to_string()]);
}

#[test]
fn cancelled_search_keeps_structural_marks() {
    let oracle = FakeOracle::default();
    oracle.field_usage("p.A", "MAX", "p.User");
    oracle.cancel_searches();
    let mut project = Project::with_oracle(&oracle);
    let flags = AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL;
    project.round(&[
        RawClass::class("p.A")
            .field(RawField::new("MAX", "I", flags).with_constant(RawConstant::Int(1)))
            .method(RawMethod::new("m", "()V", AccessFlags::PUBLIC)),
        RawClass::class("p.Caller").uses_method("p.A", "m", "()V"),
        RawClass::class("p.User"),
    ]);

    let result = project.round(&[RawClass::class("p.A")
        .field(RawField::new("MAX", "I", flags).with_constant(RawConstant::Int(2)))]);
    assert_eq!(project.names(&result), vec!["p.Caller"]);
}

#[test]
fn abstract_method_declared_only_in_source_is_found_through_oracle() {
    let oracle = FakeOracle::default();
    oracle.abstract_method("lib.Base", "run");
    let mut project = Project::with_oracle(&oracle);
    // lib.Base comes from a library: no record, only source.
    project.round(&[
        RawClass::class("p.A")
            .with_flags(PUBLIC_ABSTRACT)
            .extends("lib.Base")
            .method(RawMethod::new("run", "()V", AccessFlags::PUBLIC)),
        RawClass::class("p.C").extends("p.A"),
    ]);

    let result = project.round(&[RawClass::class("p.A")
        .with_flags(PUBLIC_ABSTRACT)
        .extends("lib.Base")]);
    assert_eq!(project.names(&result), vec!["p.C"]);
    assert!(oracle
        .queries()
        .contains(&"method lib.Base void run()".to_string()));
}

#[test]
fn classes_compiled_together_are_not_reported() {
    let mut project = Project::new();
    project.round(&[
        RawClass::class("p.A").method(RawMethod::new("m", "()V", AccessFlags::PUBLIC)),
        RawClass::class("p.B").uses_method("p.A", "m", "()V"),
    ]);
    let result = project.round(&[RawClass::class("p.A"), RawClass::class("p.B")]);
    assert!(result.classes.is_empty());
}

#[test]
fn graph_survives_reopen() {
    let mut project = Project::new();
    project.round(&[
        RawClass::class("p.A").method(RawMethod::new("m", "()V", PUBLIC_FINAL)),
        RawClass::class("p.B").uses_method("p.A", "m", "()V"),
    ]);
    let a = project.id("p.A");
    let b = project.id("p.B");

    let mut project = project.reopen();
    assert_eq!(project.id("p.A"), a);
    let m = project.id("m");
    let descriptor = project.id("()V");
    assert!(project
        .engine
        .back_dependencies(a)
        .unwrap()
        .contains(&ReferencerRecord::method(b, m, descriptor)));

    let result = project.round(&[RawClass::class("p.A")]);
    assert_eq!(result.classes, vec![b]);
}

#[test]
fn wipe_empties_the_cache() {
    let mut project = Project::new();
    project.round(&[RawClass::class("p.A"), RawClass::class("p.B").extends("p.A")]);
    assert_eq!(project.engine.all_ids().len(), 2);

    project.engine.wipe().unwrap();
    assert!(project.engine.all_ids().is_empty());
    assert!(project.engine.class_id("p.A").is_none());

    let project = project.reopen();
    assert!(project.engine.all_ids().is_empty());
    assert!(project.engine.class_id("p.B").is_none());
}

#[test]
fn remote_flag_follows_superinterfaces() {
    let mut project = Project::new();
    project.round(&[
        RawClass::interface("p.Service").implements("java.rmi.Remote"),
        RawClass::interface("p.Api").implements("p.Service"),
        RawClass::class("p.Impl").implements("p.Api"),
        RawClass::class("p.Local"),
    ]);
    let remote = |name: &str| {
        project
            .engine
            .class_record(project.id(name))
            .unwrap()
            .unwrap()
            .remote
    };
    assert!(remote("p.Service"));
    assert!(remote("p.Api"));
    assert!(remote("p.Impl"));
    assert!(!remote("p.Local"));
}

#[test]
fn removing_methods_from_remote_interface_marks_implementors() {
    let mut project = Project::new();
    project.round(&[
        RawClass::interface("p.Service")
            .implements("java.rmi.Remote")
            .method(RawMethod::new("ping", "()V", PUBLIC_ABSTRACT))
            .method(RawMethod::new("stop", "()V", PUBLIC_ABSTRACT)),
        RawClass::class("p.Impl").implements("p.Service"),
        RawClass::interface("p.Sub").implements("p.Service"),
    ]);
    let result = project.round(&[RawClass::interface("p.Service")
        .implements("java.rmi.Remote")
        .method(RawMethod::new("ping", "()V", PUBLIC_ABSTRACT))]);
    assert_eq!(project.names(&result), vec!["p.Impl"]);
}

#[test]
fn dropping_a_covariant_overload_marks_its_callers() {
    let mut project = Project::new();
    project.round(&[
        RawClass::class("p.A")
            .method(RawMethod::new(
                "m",
                "()Ljava/lang/Object;",
                AccessFlags::PUBLIC | AccessFlags::BRIDGE,
            ))
            .method(RawMethod::new("m", "()Ljava/lang/String;", AccessFlags::PUBLIC)),
        RawClass::class("p.B").uses_method("p.A", "m", "()Ljava/lang/String;"),
    ]);

    let result = project.round(&[RawClass::class("p.A").method(RawMethod::new(
        "m",
        "()Ljava/lang/Object;",
        AccessFlags::PUBLIC | AccessFlags::BRIDGE,
    ))]);
    assert_eq!(project.names(&result), vec!["p.B"]);
}

#[test]
fn updating_a_class_that_was_never_imported_keeps_its_edges() {
    let mut project = Project::new();
    project.round(&[
        RawClass::class("p.A").method(RawMethod::new("m", "()V", PUBLIC_FINAL)),
        RawClass::class("p.B").uses_method("p.A", "m", "()V"),
    ]);
    let a = project.id("p.A");
    let b = project.id("p.B");

    project.engine.update(&[b]).unwrap();
    assert_eq!(
        project.engine.find_dependent_classes().unwrap(),
        DependentClasses::default()
    );
    assert!(project.engine.class_record(b).unwrap().is_some());
    assert!(project
        .engine
        .back_dependencies(a)
        .unwrap()
        .iter()
        .any(|referencer| referencer.class == b));
    assert!(project.engine.referenced_classes(b).unwrap().contains(&a));

    let result = project.round(&[RawClass::class("p.A")]);
    assert_eq!(result.classes, vec![b]);
}
