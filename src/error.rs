//! Error types for the catalog, composition engine and scan coordinator
//!
//! Only opening a store propagates these to callers. Everywhere else the
//! error is logged and the operation degrades to an empty/no-op result, so a
//! single bad statement or misbehaving trait never aborts a scan.

use std::io;
use thiserror::Error;

/// Lattice error type
#[derive(Error, Debug)]
pub enum LatticeError {
    /// Malformed settings blob, skip pattern or config value
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A trait failed during one operation of a bound view
    #[error("Trait '{kind}' failed during {operation}: {source}")]
    Trait {
        kind: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A discovery source could not enumerate a root
    #[error("Discovery source '{source_name}' failed on '{root}': {message}")]
    Discovery {
        source_name: String,
        root: String,
        message: String,
    },

    #[error("Plugin manifest error in {path}: {message}")]
    Manifest { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LatticeError>;
