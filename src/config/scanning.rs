//! Scan defaults used by the binary

use crate::scan::DEFAULT_BATCH_SIZE;
use serde::Deserialize;

/// Scan configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Walk below scan roots (`--no-recurse` overrides per run)
    pub recursive: bool,
    /// Identifiers per discovery transaction
    pub batch_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Scan settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileScan {
    pub recursive: Option<bool>,
    pub batch_size: Option<usize>,
}

impl ScanConfig {
    /// Create from file config with defaults; a zero batch size means 1
    pub fn from_file(file: Option<FileScan>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            recursive: file.recursive.unwrap_or(defaults.recursive),
            batch_size: file.batch_size.unwrap_or(defaults.batch_size).max(1),
        }
    }
}
