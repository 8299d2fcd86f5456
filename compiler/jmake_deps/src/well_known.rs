//! Ids of the platform names the analysis compares against.

use jmake_ir::{ClassId, Symbol, SymbolError, SymbolTable};

use crate::config::EngineConfig;

#[derive(Copy, Clone, Debug)]
pub(crate) struct WellKnown {
    pub object: ClassId,
    pub remote_marker: ClassId,
    pub retention: ClassId,
    pub target: ClassId,
    /// Member name of single-element annotations.
    pub value: Symbol,
}

impl WellKnown {
    pub fn intern(symbols: &SymbolTable, config: &EngineConfig) -> Result<Self, SymbolError> {
        Ok(WellKnown {
            object: symbols.try_intern(&config.object_class)?,
            remote_marker: symbols.try_intern(&config.remote_marker)?,
            retention: symbols.try_intern("java.lang.annotation.Retention")?,
            target: symbols.try_intern("java.lang.annotation.Target")?,
            value: symbols.try_intern("value")?,
        })
    }
}
