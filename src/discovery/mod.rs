//! Discovery sources: where identifiers come from
//!
//! A source turns a root (a directory, a URL prefix, ...) into a lazy
//! sequence of candidate identifiers, navigates around locations for
//! `explore`, and judges whether a catalogued identifier is still valid for
//! pruning. The scan coordinator only ever talks to this trait.

use crate::error::LatticeError;
use regex::Regex;

pub mod filesystem;

pub use filesystem::FileSystemSource;

/// Verdict of [`DiscoverySource::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    NotValid,
    /// The source cannot judge this identifier
    Unknown,
}

/// Lazily produced candidate identifiers
pub type Identifiers = Box<dyn Iterator<Item = String> + Send>;

/// A pluggable producer of identifiers
pub trait DiscoverySource: Send + Sync {
    /// Stable name, used in logs and errors
    fn name(&self) -> &str;

    fn can_represent(&self, root: &str) -> bool;

    /// Candidate identifiers below `root`, already conformed.
    ///
    /// Finding nothing is an empty sequence, not an error. An error means
    /// the root could not be enumerated at all.
    fn identifiers(
        &self,
        root: &str,
        skip: &SkipPattern,
        recursive: bool,
    ) -> anyhow::Result<Identifiers>;

    /// Locations above `location`, nearest first
    fn above(&self, _location: &str) -> Vec<String> {
        Vec::new()
    }

    /// Locations directly below `location`
    fn below(&self, _location: &str) -> Vec<String> {
        Vec::new()
    }

    fn check(&self, _identifier: &str) -> Validity {
        Validity::Unknown
    }
}

/// Union of the configured skip regexes.
///
/// Patterns are compiled one at a time; a pattern that fails to compile is
/// logged and dropped, the rest still apply. Patterns are not conformed:
/// `\` is a regex escape here, and identifiers are already conformed.
#[derive(Debug, Clone, Default)]
pub struct SkipPattern {
    regex: Option<Regex>,
    rejected: Vec<String>,
}

impl SkipPattern {
    /// Pattern that skips nothing
    pub fn none() -> Self {
        Self::default()
    }

    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref().to_string();
            if pattern.is_empty() {
                continue;
            }
            match Regex::new(&pattern) {
                Ok(_) => accepted.push(format!("({})", pattern)),
                Err(e) => {
                    let err = LatticeError::Configuration(format!(
                        "invalid skip pattern '{}': {}",
                        pattern, e
                    ));
                    tracing::warn!("{}; pattern dropped", err);
                    rejected.push(pattern);
                }
            }
        }

        let regex = if accepted.is_empty() {
            None
        } else {
            match Regex::new(&accepted.join("|")) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    // Each part compiled alone; only size limits can land here
                    tracing::warn!("Skip pattern union rejected: {}; skipping nothing", e);
                    None
                }
            }
        };

        Self { regex, rejected }
    }

    /// Whether `identifier` should be skipped
    pub fn is_match(&self, identifier: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(identifier))
    }

    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    /// Patterns dropped because they did not compile
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }
}
