//! Configuration for the lattice binary
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/lattice/config.toml)
//! 3. Built-in defaults (lowest priority)
//!
//! Per-catalog settings (scan locations, skip regexes, stored plugin
//! locations) live inside the catalog itself; this file only carries what
//! the binary needs before a catalog is open.

use crate::catalog::DEFAULT_LIMIT;
use crate::error::{LatticeError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod observability;
mod scanning;
mod serialization;

#[cfg(test)]
mod tests;

pub use observability::{FileLogging, LogRotation, LoggingConfig};
pub use scanning::{FileScan, ScanConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Catalog path override
pub const ENV_CATALOG: &str = "LATTICE_CATALOG";
/// Default `find` limit override
pub const ENV_LIMIT: &str = "LATTICE_LIMIT";
/// Log level override (`RUST_LOG` still wins)
pub const ENV_LOG: &str = "LATTICE_LOG";

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog opened when `--catalog` is not given
    pub catalog_path: Option<PathBuf>,

    /// Result limit for `find` when the caller gives none
    pub default_limit: usize,

    /// Plugin locations searched for every catalog, after its stored ones
    pub plugin_locations: Vec<String>,

    /// Scan defaults
    pub scan: ScanConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: None,
            default_limit: DEFAULT_LIMIT,
            plugin_locations: Vec::new(),
            scan: ScanConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure; every key is optional
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub catalog_path: Option<String>,
    pub default_limit: Option<usize>,
    pub plugin_locations: Option<Vec<String>>,

    /// Optional [scan] section
    pub scan: Option<FileScan>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/lattice/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("lattice").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // config is optional
            }
        }

        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Parse one config file. A missing file is an empty config; a file
    /// that exists but cannot be read or parsed is an error.
    pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|e| {
                LatticeError::Configuration(format!(
                    "failed to parse {}: {}\n  Tip: check quoting, booleans (true/false) and section names; delete the file to reset",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(e) => Err(LatticeError::Configuration(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Result<Self> {
        let file = match Self::config_path() {
            Some(path) => Self::load_file_config(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(file, |key| std::env::var(key).ok()))
    }

    /// Merge a parsed file with an environment lookup
    pub(crate) fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        // Catalog path: env > file > none
        let catalog_path = env(ENV_CATALOG)
            .or(file.catalog_path)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        // Default limit: env > file > default; unparsable env values are ignored
        let default_limit = env(ENV_LIMIT)
            .and_then(|v| v.parse().ok())
            .or(file.default_limit)
            .unwrap_or(defaults.default_limit);

        let plugin_locations = file.plugin_locations.unwrap_or_default();

        let scan = ScanConfig::from_file(file.scan);

        let mut logging = LoggingConfig::from_file(file.logging);
        if let Some(level) = env(ENV_LOG) {
            logging.level = level;
        }

        Self {
            catalog_path,
            default_limit,
            plugin_locations,
            scan,
            logging,
        }
    }
}
