//! The public engine: one instance per project cache directory.
//!
//! A build round is driven by the compiler driver:
//!
//! 1. [`import_class`](DependencyEngine::import_class) every freshly compiled
//!    class and [`mark_source_removed`](DependencyEngine::mark_source_removed)
//!    every class whose source is gone;
//! 2. [`update`](DependencyEngine::update) the graph with the compiled ids;
//! 3. [`find_dependent_classes`](DependencyEngine::find_dependent_classes)
//!    to learn what else must be recompiled. This ends the round.
//!
//! Any [`CacheCorrupted`] error leaves the cache unusable; the driver's only
//! recovery is [`wipe`](DependencyEngine::wipe) and a full rebuild.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use jmake_ir::{ClassId, ClassRecord, ClassReference, RawClass, ReferencerRecord, SymbolTable};
use jmake_store::{CacheCorrupted, StoreResult};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, trace, warn};

use crate::analyzer::{ChangeImpactAnalyzer, ClassDiff};
use crate::config::EngineConfig;
use crate::graph::{GraphManager, Stores};
use crate::marks::{MarkReason, RecompileSet};
use crate::navigator::OldView;
use crate::processors::oracle::{SearchBudget, UsageOracle};
use crate::processors::{changed_constants, ChangedConstant, SourceUsageProcessor};
use crate::well_known::WellKnown;

/// Result of a round: classes to recompile and the source files holding
/// them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependentClasses {
    /// In id order.
    pub classes: Vec<ClassId>,
    /// Sorted, without duplicates. Classes without a known source path
    /// contribute nothing.
    pub files: Vec<PathBuf>,
}

/// State accumulated between the first import of a round and
/// `find_dependent_classes`.
#[derive(Default)]
struct Round {
    /// Committed record of each updated or removed class as it was before
    /// the round; `None` for classes new this round.
    previous: FxHashMap<ClassId, Option<Arc<ClassRecord>>>,
    /// Constant-pool references of imported classes, until promotion.
    references: FxHashMap<ClassId, Vec<ClassReference>>,
    pending_removals: Vec<ClassId>,
    removed: FxHashSet<ClassId>,
    /// Users and subclasses of each removed class, taken before removal.
    removed_dependents: FxHashMap<ClassId, Vec<ClassId>>,
    /// Compiled classes in update order.
    changed: Vec<ClassId>,
    compiled: FxHashSet<ClassId>,
}

/// Incremental-recompilation dependency engine.
pub struct DependencyEngine {
    config: EngineConfig,
    symbols: SymbolTable,
    names: WellKnown,
    stores: Stores,
    round: Round,
    oracle: Option<Box<dyn UsageOracle>>,
}

impl DependencyEngine {
    /// Open (or create) the cache in `config.cache_dir`.
    #[tracing::instrument(level = "debug", skip_all, fields(dir = %config.cache_dir.display()))]
    pub fn open(config: EngineConfig) -> StoreResult<Self> {
        let stores = Stores::open(config.dir(), &config.store)?;
        let symbols = SymbolTable::open(config.symbols_path())?;
        let names = WellKnown::intern(&symbols, &config)?;
        debug!(symbols = symbols.len(), "dependency cache opened");
        Ok(DependencyEngine {
            config,
            symbols,
            names,
            stores,
            round: Round::default(),
            oracle: None,
        })
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: impl UsageOracle + 'static) -> Self {
        self.set_oracle(oracle);
        self
    }

    pub fn set_oracle(&mut self, oracle: impl UsageOracle + 'static) {
        self.oracle = Some(Box::new(oracle));
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Id of an already-interned class name.
    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.symbols.lookup(name)
    }

    /// Intern a freshly compiled class and stage its record for the next
    /// [`update`](Self::update).
    pub fn import_class(&mut self, raw: &RawClass) -> StoreResult<ClassId> {
        let record = raw.intern(&self.symbols)?;
        let id = record.id;
        let (staged, references) = record.without_references();
        self.stores.scratch.put(id, staged)?;
        self.round.references.insert(id, references);
        trace!(class = %raw.name, references = self.round.references[&id].len(), "class imported");
        Ok(id)
    }

    /// Queue the removal of a class whose source file was deleted.
    pub fn mark_source_removed(&mut self, id: ClassId) {
        if !self.round.pending_removals.contains(&id) {
            self.round.pending_removals.push(id);
        }
    }

    /// Fold the compiled classes `changed` and the queued removals into the
    /// dependency graph.
    #[tracing::instrument(level = "debug", skip_all, fields(changed = changed.len()))]
    pub fn update(&mut self, changed: &[ClassId]) -> StoreResult<()> {
        let round = &mut self.round;
        let stores = &self.stores;
        let removals = std::mem::take(&mut round.pending_removals);
        let mut imported = Vec::with_capacity(changed.len());
        for &id in changed {
            if removals.contains(&id) {
                continue;
            }
            if stores.scratch.contains_id(id) {
                imported.push(id);
            } else {
                warn!(
                    class = %self.symbols.display_name(id),
                    "changed class was never imported; skipped"
                );
            }
        }
        let changed = imported;

        for &id in changed.iter().chain(&removals) {
            if !round.previous.contains_key(&id) {
                let previous = stores.classes.get(id)?;
                round.previous.insert(id, previous);
            }
        }
        for &id in &removals {
            let mut dependents = stores.back_deps.referencing_classes(id)?;
            dependents.extend(stores.subclasses.get_all(id)?);
            dependents.sort_unstable();
            dependents.dedup();
            round.removed_dependents.insert(id, dependents);
        }

        let graph = GraphManager {
            stores,
            symbols: &self.symbols,
            names: &self.names,
        };
        for &id in &changed {
            graph.retract(id, round.previous[&id].as_deref())?;
        }
        let mut promoted = Vec::with_capacity(changed.len());
        for &id in &changed {
            if let Some(record) = graph.promote(id)? {
                promoted.push(record);
            }
        }
        for record in &promoted {
            let references = round.references.remove(&record.id).unwrap_or_default();
            graph.add_forward_edges(record, &references)?;
        }
        for record in &promoted {
            graph.update_remote_flag(record.id)?;
        }
        for record in &promoted {
            graph.add_subclass_edges(record)?;
        }
        for &id in &removals {
            graph.remove_class(id, round.previous[&id].as_deref())?;
            round.compiled.remove(&id);
            round.changed.retain(|&class| class != id);
            round.removed.insert(id);
        }
        stores.scratch.clear()?;

        for record in &promoted {
            if round.compiled.insert(record.id) {
                round.changed.push(record.id);
            }
        }
        debug!(
            promoted = promoted.len(),
            removed = removals.len(),
            "dependency graph updated"
        );
        Ok(())
    }

    /// Classes that must be recompiled because of this round's changes.
    /// Ends the round.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn find_dependent_classes(&mut self) -> StoreResult<DependentClasses> {
        let round = std::mem::take(&mut self.round);
        let mut marks = RecompileSet::excluding(
            round.compiled.iter().chain(&round.removed).copied(),
        );
        let old_view = OldView::new(&self.stores.classes, &round.previous);

        let mut constants: Vec<(ClassId, Vec<ChangedConstant>)> = Vec::new();
        let mut escalated = Vec::new();
        for &id in &round.changed {
            let Some(Some(old)) = round.previous.get(&id) else {
                continue;
            };
            let Some(new) = self.stores.classes.get(id)? else {
                continue;
            };
            let diff = ClassDiff::compute(old, &new, &self.symbols, &self.names);
            ChangeImpactAnalyzer {
                symbols: &self.symbols,
                names: &self.names,
                old_view: &old_view,
                current: &self.stores.classes,
                back_deps: &self.stores.back_deps,
                subclasses: &self.stores.subclasses,
                compiled: &round.compiled,
                oracle: self.oracle.as_deref(),
                marks: &mut marks,
            }
            .analyze(old, &diff)?;

            let changed = changed_constants(old, &new);
            if !changed.is_empty() {
                constants.push((id, changed));
            }
            if old.is_annotation() && diff.retention_escalated {
                escalated.push(id);
            }
        }

        let mut removed: Vec<ClassId> = round.removed.iter().copied().collect();
        removed.sort_unstable();
        for id in removed {
            for &dependent in round.removed_dependents.get(&id).into_iter().flatten() {
                marks.mark(dependent, MarkReason::ClassRemoved(id), &self.symbols);
            }
        }

        if let Some(oracle) = self.oracle.as_deref() {
            let mut processor = SourceUsageProcessor {
                symbols: &self.symbols,
                oracle,
                budget: SearchBudget::starting_now(self.config.search_budget),
                marks: &mut marks,
            };
            for (owner, changed) in &constants {
                processor.process_constants(*owner, changed);
            }
            for &annotation in &escalated {
                processor.process_retention(annotation);
            }
        }

        let classes = marks.into_sorted();
        let mut files = Vec::new();
        for &class in &classes {
            if let Some(path) = self
                .stores
                .classes
                .get(class)?
                .and_then(|record| record.source_path.clone())
            {
                files.push(path);
            }
        }
        files.sort();
        files.dedup();
        info!(
            classes = classes.len(),
            files = files.len(),
            "dependent classes found"
        );
        Ok(DependentClasses { classes, files })
    }

    /// Drop every store and the symbol table, leaving an empty cache.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn wipe(&mut self) -> StoreResult<()> {
        self.stores.clear()?;
        let path = self.config.symbols_path();
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheCorrupted::io(&path, e)),
        }
        self.symbols = SymbolTable::open(path)?;
        self.names = WellKnown::intern(&self.symbols, &self.config)?;
        self.round = Round::default();
        info!("dependency cache wiped");
        Ok(())
    }

    /// Make every store and the symbol table durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.stores.flush()?;
        self.symbols.save()?;
        Ok(())
    }

    /// Flush and close.
    pub fn dispose(self) -> StoreResult<()> {
        self.stores.dispose()?;
        self.symbols.save()?;
        Ok(())
    }

    pub fn class_record(&self, id: ClassId) -> StoreResult<Option<Arc<ClassRecord>>> {
        self.stores.classes.get(id)
    }

    pub fn all_ids(&self) -> FxHashSet<ClassId> {
        self.stores.classes.all_ids()
    }

    /// Who uses `id`, and through which member.
    pub fn back_dependencies(&self, id: ClassId) -> StoreResult<FxHashSet<ReferencerRecord>> {
        self.stores.back_deps.referencers(id)
    }

    pub fn referenced_classes(&self, id: ClassId) -> StoreResult<FxHashSet<ClassId>> {
        self.stores.referenced.get_all(id)
    }

    /// Transitive subclasses and implementors of `id`.
    pub fn subclasses(&self, id: ClassId) -> StoreResult<FxHashSet<ClassId>> {
        self.stores.subclasses.get_all(id)
    }
}
