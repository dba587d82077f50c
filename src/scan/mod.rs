//! Scan passes: discovery → catalog → composition → tags → pruning
//!
//! ```text
//! Idle ──→ Discovering ──→ Tagging ──→ Pruning ──→ Complete
//!               │                                    ↑
//!               └─────── lightweight / cancelled ────┘
//! ```
//!
//! `Tagging` and `Pruning` only run for a full scan. Every state checks the
//! [`CancelToken`] between identifiers; a cancelled pass commits what it
//! finished and jumps straight to `Complete`. `scan_complete` is emitted
//! exactly once per pass, whatever happened on the way.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub mod coordinator;

pub use coordinator::ScanCoordinator;

/// Default number of identifiers inserted per discovery transaction
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// State of a scan pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Discovering,
    Tagging,
    Pruning,
    Complete,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Discovering => "discovering",
            ScanState::Tagging => "tagging",
            ScanState::Pruning => "pruning",
            ScanState::Complete => "complete",
        }
    }
}

/// How a pass runs
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Walk below the roots instead of listing them
    pub recursive: bool,
    /// Run tagging and pruning after discovery
    pub full: bool,
    /// Identifiers per discovery transaction
    pub batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            full: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Shared cancellation flag, checked between identifiers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one scan pass
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scan_id: String,
    /// Identifiers inserted this pass, deduplicated, in discovery order
    pub touched: Vec<String>,
    /// New tag rows
    pub tags_written: usize,
    /// New identifier/tag links
    pub links_written: usize,
    /// Identifiers removed because a source judged them invalid
    pub pruned: Vec<String>,
    /// Isolated failures (statements, traits, sources, sinks)
    pub failures: u64,
    pub cancelled: bool,
    pub final_state: ScanState,
}

impl ScanReport {
    fn new(scan_id: String) -> Self {
        Self {
            scan_id,
            touched: Vec::new(),
            tags_written: 0,
            links_written: 0,
            pruned: Vec::new(),
            failures: 0,
            cancelled: false,
            final_state: ScanState::Idle,
        }
    }
}

static SCAN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique id for a pass: UTC timestamp plus a process-wide counter
pub fn next_scan_id() -> String {
    let n = SCAN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_ids_are_unique() {
        assert_ne!(next_scan_id(), next_scan_id());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_default_options() {
        let options = ScanOptions::default();
        assert!(options.recursive && options.full);
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
    }
}
