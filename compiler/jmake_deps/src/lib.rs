//! jmake deps - incremental recompilation dependency engine
//!
//! Records, per compiled class, its structural metadata and who uses it,
//! persists that graph across builds, and after a round of recompilation
//! computes which other classes are stale because the API of a changed class
//! moved under them.
//!
//! - [`DependencyEngine`]: the per-project entry point (import, update,
//!   find dependents, wipe, dispose)
//! - Graph maintenance: retracting and rebuilding forward, back and subclass
//!   edges for each changed class
//! - Change-impact analysis: a fixed rule order over the old and new version
//!   of each changed class, marking users, subclasses and hierarchy neighbours
//! - Source-level passes through a host-supplied [`UsageOracle`] for inlined
//!   constants and escalated annotation retention
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=jmake_deps=debug`: every mark with its reason, round summaries.
//! - `RUST_LOG=jmake_deps=trace,jmake_store=trace`: also imports, edge
//!   corrections, store evictions and compactions.

mod analyzer;
mod config;
mod engine;
mod graph;
mod marks;
mod navigator;
mod processors;
mod well_known;

pub use analyzer::{ClassDiff, MethodChange};
pub use config::EngineConfig;
pub use engine::{DependencyEngine, DependentClasses};
pub use marks::{MarkReason, ReasonDisplay, RecompileSet};
pub use navigator::Control;
pub use processors::oracle::{
    DeclaredMethod, MethodPattern, SearchCancelled, SourceUsage, UsageOracle,
};

pub use jmake_store::{CacheCorrupted, StoreConfig, StoreResult};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber driven by `RUST_LOG`.
///
/// Does nothing if `RUST_LOG` is unset, and nothing after the first call.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
