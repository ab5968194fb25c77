#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Macrobot — a local macro playback service built on the Enigo library.
//!
//! Clients submit ordered step lists (pointer moves, clicks, typed text, waits,
//! key chords, nested repeats) over HTTP; a single background worker plays them
//! back and can be interrupted by a newer submission or an explicit stop.
//! - `config`: Server/engine configuration models, loader, and schema helpers.
//! - `steps`: The macro step model and its lenient JSON decoding.
//! - `executor`: Input drivers, the step interpreter, and the run controller.
//! - `server`: The axum transport and static UI serving.
//! - `utils`: Platform helpers (opening URLs).
//!
//! Use `macrobot::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: execution engine (drivers, interpreter, controller).
pub mod executor;
/// Public module: HTTP transport.
pub mod server;
/// Public module: macro step model.
pub mod steps;
/// Public module: utilities (URL opening, etc.).
pub mod utils;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a simple level name (trace|debug|info|warn|error).
pub fn parse_level(s: &str) -> Option<tracing::Level> {
    use tracing::Level;
    match s.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - `level` wins when given (e.g. from `--log-level`).
/// - Otherwise honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::fmt;

    let level = level
        .and_then(parse_level)
        .or_else(|| std::env::var("RUST_LOG").ok().as_deref().and_then(parse_level))
        .unwrap_or(tracing::Level::INFO);

    // Ignore the error if the global subscriber was already set.
    let _ = fmt().with_max_level(level).try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use macrobot::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Timing helpers
    pub use std::time::Duration;

    // External crates (namespaced) if callers want direct access
    pub use crate as macrobot;
    pub use enigo;

    // Frequently used internal types
    pub use crate::config::{EngineConfig, ServerConfig};
    pub use crate::executor::{DesktopDriver, DryRunDriver, InputDriver, RunController};
    pub use crate::steps::{MacroStep, RunRequest};
    pub use crate::{config, executor, server, steps, utils};
}
