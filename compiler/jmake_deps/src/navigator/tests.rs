use super::*;
use jmake_ir::{RawClass, SymbolTable};
use jmake_store::StoreConfig;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    symbols: SymbolTable,
    classes: ClassRecordStore,
    subclasses: DependencySetStore,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::default();
        let classes = ClassRecordStore::open(dir.path(), "classes", &config).unwrap();
        let subclasses = DependencySetStore::open(dir.path(), "subclasses", &config).unwrap();
        Fixture {
            _dir: dir,
            symbols: SymbolTable::in_memory(),
            classes,
            subclasses,
        }
    }

    fn put(&self, raw: &RawClass) -> ClassId {
        let record = raw.intern(&self.symbols).unwrap();
        let id = record.id;
        self.classes.put(id, record).unwrap();
        id
    }

    fn id(&self, name: &str) -> ClassId {
        self.symbols.lookup(name).unwrap()
    }

    fn names(&self, ids: &[ClassId]) -> Vec<String> {
        ids.iter().map(|id| self.symbols.display_name(*id)).collect()
    }
}

/// `p.C extends p.B extends p.A`, `p.A implements p.I`, `p.I extends p.J`,
/// `p.C implements p.K`.
fn hierarchy() -> Fixture {
    let fx = Fixture::new();
    fx.put(&RawClass::interface("p.J"));
    fx.put(&RawClass::interface("p.I").implements("p.J"));
    fx.put(&RawClass::interface("p.K"));
    fx.put(&RawClass::class("p.A").implements("p.I"));
    fx.put(&RawClass::class("p.B").extends("p.A"));
    fx.put(&RawClass::class("p.C").extends("p.B").implements("p.K"));
    fx
}

#[test]
fn test_walk_super_classes_nearest_first() {
    let fx = hierarchy();
    let mut seen = Vec::new();
    walk_super_classes(&fx.classes, fx.id("p.C"), |class| {
        seen.push(class);
        Ok(Control::Continue)
    })
    .unwrap();
    // java.lang.Object has no record, so the walk ends there.
    assert_eq!(fx.names(&seen), ["p.B", "p.A", "java.lang.Object"]);
}

#[test]
fn test_walk_super_classes_stops() {
    let fx = hierarchy();
    let mut seen = Vec::new();
    walk_super_classes(&fx.classes, fx.id("p.C"), |class| {
        seen.push(class);
        Ok(Control::Stop)
    })
    .unwrap();
    assert_eq!(fx.names(&seen), ["p.B"]);
}

#[test]
fn test_walk_super_interfaces_includes_inherited() {
    let fx = hierarchy();
    let mut seen = Vec::new();
    walk_super_interfaces(&fx.classes, fx.id("p.C"), |class| {
        seen.push(class);
        Ok(Control::Continue)
    })
    .unwrap();
    assert_eq!(fx.names(&seen), ["p.K", "p.I", "p.J"]);
}

#[test]
fn test_for_each_ancestor_visits_once() {
    let fx = hierarchy();
    fx.put(&RawClass::class("p.D").extends("p.A").implements("p.I"));
    let record = fx.classes.get(fx.id("p.D")).unwrap().unwrap();
    let mut seen = Vec::new();
    for_each_ancestor(&fx.classes, &record, |class| {
        seen.push(class);
        Ok(())
    })
    .unwrap();
    let mut names = fx.names(&seen);
    names.sort();
    assert_eq!(names, ["java.lang.Object", "p.A", "p.I", "p.J"]);
}

#[test]
fn test_walk_sub_classes_in_id_order() {
    let fx = hierarchy();
    let a = fx.id("p.A");
    for sub in ["p.C", "p.B"] {
        fx.subclasses.add(a, fx.id(sub)).unwrap();
    }
    let mut seen = Vec::new();
    walk_sub_classes(&fx.subclasses, a, |class| {
        seen.push(class);
        Ok(Control::Continue)
    })
    .unwrap();
    assert_eq!(fx.names(&seen), ["p.B", "p.C"]);
}

#[test]
fn test_old_view_prefers_stashed_records() {
    let fx = hierarchy();
    let b = fx.id("p.B");
    let old_b = fx.classes.get(b).unwrap();
    fx.put(&RawClass::class("p.B").extends("p.Other"));
    let fresh = fx.put(&RawClass::class("p.New"));

    let mut previous = FxHashMap::default();
    previous.insert(b, old_b);
    previous.insert(fresh, None);
    let view = OldView::new(&fx.classes, &previous);

    let mut seen = Vec::new();
    walk_super_classes(&view, fx.id("p.C"), |class| {
        seen.push(class);
        Ok(Control::Continue)
    })
    .unwrap();
    assert_eq!(fx.names(&seen), ["p.B", "p.A", "java.lang.Object"]);
    assert!(view.record(fresh).unwrap().is_none());
    assert_eq!(view.record(b).unwrap().unwrap().super_class, Some(fx.id("p.A")));
}

#[test]
fn test_cyclic_hierarchy_terminates() {
    let fx = Fixture::new();
    fx.put(&RawClass::class("p.X").extends("p.Y"));
    fx.put(&RawClass::class("p.Y").extends("p.X"));
    let mut count = 0;
    walk_super_classes(&fx.classes, fx.id("p.X"), |_| {
        count += 1;
        Ok(Control::Continue)
    })
    .unwrap();
    assert_eq!(count, 1);
}
