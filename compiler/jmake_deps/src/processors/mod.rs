//! Source-level passes run after the structural analysis.
//!
//! Inlined constants and source-retained annotations leave no trace in the
//! class files of their users, so the structural graph cannot find them.
//! These passes ask the [`UsageOracle`] for textual occurrences instead and
//! mark the classes that contain them.

mod constants;
pub mod oracle;
mod retention;

use jmake_ir::{ClassId, SymbolTable};
use tracing::trace;

use crate::marks::{MarkReason, RecompileSet};
use oracle::{SearchBudget, SearchCancelled, SourceUsage, UsageOracle};

pub(crate) use constants::{changed_constants, ChangedConstant};

/// One source-search pass over the classes queued by the analysis.
pub(crate) struct SourceUsageProcessor<'a> {
    pub symbols: &'a SymbolTable,
    pub oracle: &'a dyn UsageOracle,
    pub budget: SearchBudget,
    pub marks: &'a mut RecompileSet,
}

impl SourceUsageProcessor<'_> {
    /// A textual occurrence counts unless the oracle, within budget, says it
    /// refers to something else.
    fn is_real(&self, usage: &SourceUsage) -> Result<bool, SearchCancelled> {
        if self.budget.is_exhausted() {
            return Ok(true);
        }
        self.oracle.resolve(usage)
    }

    /// Mark the class containing `usage`. Classes the engine has never seen
    /// have nothing to recompile.
    fn mark_usage(&mut self, usage: &SourceUsage, reason: MarkReason) {
        let Some(class) = self.class_id(&usage.enclosing_class) else {
            trace!(class = %usage.enclosing_class, "usage in unknown class");
            return;
        };
        self.marks.mark(class, reason, self.symbols);
    }

    fn class_id(&self, name: &str) -> Option<ClassId> {
        self.symbols.lookup(name)
    }
}
