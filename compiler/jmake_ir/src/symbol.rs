//! Symbol table mapping qualified names and member names to compact ids.
//!
//! Every store keys and compares by [`Symbol`], never by string. The table
//! is persisted next to the stores and is reset together with them when the
//! cache is wiped.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Interned name identifier.
///
/// Class ids, member names, descriptors and generic signatures all share
/// the same id space.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Symbol(u32);

/// A symbol naming a fully qualified class.
pub type ClassId = Symbol;

impl Symbol {
    /// Placeholder for a class that is not known (e.g. the superclass of
    /// `java.lang.Object`).
    pub const UNKNOWN: Symbol = Symbol(u32::MAX);

    /// Create from raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Symbol(raw)
    }

    /// Get raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_unknown(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "Symbol(unknown)")
        } else {
            write!(f, "Symbol({})", self.0)
        }
    }
}

/// Error raised by the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// More names than fit in the id space.
    Overflow { count: usize },
    /// The persisted table could not be read or written.
    Io { path: PathBuf, message: String },
    /// The persisted table is not a valid encoding.
    Decode { path: PathBuf, message: String },
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::Overflow { count } => write!(
                f,
                "symbol table exceeded capacity: {count} names, max is {}",
                u32::MAX - 1
            ),
            SymbolError::Io { path, message } => {
                write!(f, "symbol table I/O error at '{}': {message}", path.display())
            }
            SymbolError::Decode { path, message } => {
                write!(f, "symbol table at '{}' is corrupted: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for SymbolError {}

#[derive(Default)]
struct Table {
    ids: FxHashMap<Box<str>, u32>,
    names: Vec<Box<str>>,
    /// Names were added since the last save.
    dirty: bool,
}

impl Table {
    fn from_names(names: Vec<String>) -> Self {
        let names: Vec<Box<str>> = names.into_iter().map(String::into_boxed_str).collect();
        let mut ids = FxHashMap::default();
        ids.reserve(names.len());
        // Length was bounded by u32 when the table was written.
        for (id, name) in (0u32..).zip(names.iter()) {
            ids.insert(name.clone(), id);
        }
        Table {
            ids,
            names,
            dirty: false,
        }
    }
}

/// Bidirectional name ↔ id mapping.
///
/// One table per engine instance. Interning is append-only; ids are stable
/// for as long as the persisted table lives.
pub struct SymbolTable {
    table: RwLock<Table>,
    /// Backing file, `None` for a purely in-memory table.
    path: Option<PathBuf>,
}

impl SymbolTable {
    /// Create an empty table that is never persisted.
    pub fn in_memory() -> Self {
        SymbolTable {
            table: RwLock::new(Table::default()),
            path: None,
        }
    }

    /// Open the table persisted at `path`, or start empty if it does not
    /// exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SymbolError> {
        let path = path.into();
        let table = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| SymbolError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let names: Vec<String> =
                bincode::deserialize(&bytes).map_err(|e| SymbolError::Decode {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            Table::from_names(names)
        } else {
            Table::default()
        };
        Ok(SymbolTable {
            table: RwLock::new(table),
            path: Some(path),
        })
    }

    /// Try to intern a name, returning its id or an error on overflow.
    pub fn try_intern(&self, name: &str) -> Result<Symbol, SymbolError> {
        // Fast path: already interned
        if let Some(&id) = self.table.read().ids.get(name) {
            return Ok(Symbol(id));
        }

        let mut table = self.table.write();

        // Double-check after acquiring write lock
        if let Some(&id) = table.ids.get(name) {
            return Ok(Symbol(id));
        }

        let id = u32::try_from(table.names.len())
            .ok()
            .filter(|id| *id != u32::MAX)
            .ok_or(SymbolError::Overflow {
                count: table.names.len(),
            })?;
        let boxed: Box<str> = name.into();
        table.names.push(boxed.clone());
        table.ids.insert(boxed, id);
        table.dirty = true;
        Ok(Symbol(id))
    }

    /// Intern a name, returning its id.
    ///
    /// # Panics
    /// Panics if the table exceeds capacity. Use `try_intern` for fallible
    /// interning.
    pub fn intern(&self, name: &str) -> Symbol {
        self.try_intern(name).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Look up a name without interning it.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.table.read().ids.get(name).copied().map(Symbol)
    }

    /// Resolve an id back to its name.
    pub fn resolve(&self, symbol: Symbol) -> Option<String> {
        self.table
            .read()
            .names
            .get(symbol.0 as usize)
            .map(|name| name.to_string())
    }

    /// Run `f` over the name of `symbol` without allocating.
    pub fn with_name<R>(&self, symbol: Symbol, f: impl FnOnce(&str) -> R) -> Option<R> {
        self.table.read().names.get(symbol.0 as usize).map(|n| f(n))
    }

    /// Name for diagnostics; never fails.
    pub fn display_name(&self, symbol: Symbol) -> String {
        if symbol.is_unknown() {
            return "<unknown>".to_string();
        }
        self.resolve(symbol)
            .unwrap_or_else(|| format!("<symbol {}>", symbol.0))
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.table.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backing file, if persisted.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the table to its backing file if anything was interned since
    /// the last save.
    pub fn save(&self) -> Result<(), SymbolError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut table = self.table.write();
        if !table.dirty {
            return Ok(());
        }
        let bytes = bincode::serialize(&table.names).map_err(|e| SymbolError::Decode {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .and_then(|()| fs::rename(&tmp, path))
            .map_err(|e| SymbolError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
        table.dirty = false;
        Ok(())
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.len())
            .field("path", &self.path)
            .finish()
    }
}
