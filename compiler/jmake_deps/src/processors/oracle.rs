//! Source-level search, supplied by the host.
//!
//! Bytecode loses some dependencies: constants are inlined and
//! source-retained annotations are dropped. A [`UsageOracle`] finds such
//! uses in source text. Any call may be cancelled; cancellation abandons the
//! current pass for one class and is never an engine error.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

/// The search was cancelled by the host.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Error)]
#[error("source search cancelled")]
pub struct SearchCancelled;

/// One textual occurrence found by the oracle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceUsage {
    /// Qualified name of the top-level or nested class containing the
    /// occurrence.
    pub enclosing_class: String,
    /// Oracle-defined handle, passed back to [`UsageOracle::resolve`].
    pub handle: u64,
}

/// A method shape in source form, e.g. `int size(java.lang.String[])`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodPattern {
    pub return_type: String,
    pub name: String,
    pub params: Vec<String>,
}

impl fmt::Display for MethodPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param} arg{idx}")?;
        }
        f.write_str(")")
    }
}

/// A method the oracle found declared in source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeclaredMethod {
    pub is_abstract: bool,
}

/// Host-provided search over project sources.
pub trait UsageOracle {
    /// Occurrences of field `field` of class `owner`.
    fn find_field_usages(&self, owner: &str, field: &str)
        -> Result<Vec<SourceUsage>, SearchCancelled>;

    /// Occurrences of annotation type `annotation`.
    fn find_annotation_usages(&self, annotation: &str) -> Result<Vec<SourceUsage>, SearchCancelled>;

    /// Whether a textual occurrence really refers to the searched element.
    fn resolve(&self, usage: &SourceUsage) -> Result<bool, SearchCancelled>;

    /// A method of `class` (or its source-level ancestors) matching
    /// `pattern`.
    fn find_method(
        &self,
        class: &str,
        pattern: &MethodPattern,
    ) -> Result<Option<DeclaredMethod>, SearchCancelled>;
}

/// Wall-clock budget for resolving usages.
#[derive(Copy, Clone, Debug)]
pub struct SearchBudget {
    /// `None` if the budget is too large to represent.
    deadline: Option<Instant>,
}

impl SearchBudget {
    pub fn starting_now(budget: Duration) -> Self {
        SearchBudget {
            deadline: Instant::now().checked_add(budget),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests;
