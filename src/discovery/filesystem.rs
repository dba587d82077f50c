//! Built-in discovery source over the local file system

use super::{DiscoverySource, Identifiers, SkipPattern, Validity};
use crate::util::conform;
use std::path::Path;
use walkdir::WalkDir;

/// Walks directories; identifiers are conformed file paths
#[derive(Debug, Clone, Default)]
pub struct FileSystemSource;

impl FileSystemSource {
    pub const NAME: &'static str = "file_scanner";

    pub fn new() -> Self {
        Self
    }

    /// `/…` or a drive-letter path such as `C:/…`
    fn is_absolute(identifier: &str) -> bool {
        let bytes = identifier.as_bytes();
        identifier.starts_with('/')
            || (bytes.len() >= 3
                && bytes[0].is_ascii_alphabetic()
                && bytes[1] == b':'
                && bytes[2] == b'/')
    }
}

impl DiscoverySource for FileSystemSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_represent(&self, root: &str) -> bool {
        Path::new(root).exists()
    }

    /// Recursive: every file below `root`. Non-recursive: every entry
    /// directly inside `root`, files and directories alike. Sorted by file
    /// name; unreadable entries are logged and skipped.
    fn identifiers(
        &self,
        root: &str,
        skip: &SkipPattern,
        recursive: bool,
    ) -> anyhow::Result<Identifiers> {
        // Fail up front when the root itself cannot be read
        std::fs::metadata(root)?;

        let walker = if recursive {
            WalkDir::new(root)
        } else {
            WalkDir::new(root).min_depth(1).max_depth(1)
        };

        let root_name = root.to_string();
        let skip = skip.clone();
        let iter = walker
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(source = Self::NAME, root = %root_name, "Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(move |entry| !recursive || entry.file_type().is_file())
            .map(|entry| conform(&entry.path().to_string_lossy()))
            .filter(move |identifier| !skip.is_match(identifier));

        Ok(Box::new(iter))
    }

    fn above(&self, location: &str) -> Vec<String> {
        let location = conform(location);
        let parts: Vec<&str> = location.split('/').collect();

        (1..parts.len())
            .map(|i| parts[..parts.len() - i].join("/"))
            .filter(|folder| !folder.is_empty() && !folder.ends_with(':'))
            .collect()
    }

    fn below(&self, location: &str) -> Vec<String> {
        let entries = match std::fs::read_dir(location) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Cannot list {}: {}", location, e);
                return Vec::new();
            }
        };

        let mut folders: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| conform(&entry.path().to_string_lossy()))
            .collect();
        folders.sort();
        folders
    }

    fn check(&self, identifier: &str) -> Validity {
        if !Self::is_absolute(identifier) {
            return Validity::Unknown;
        }
        if Path::new(identifier).exists() {
            Validity::Valid
        } else {
            Validity::NotValid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.carnivore.txt"), "a").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("c.tmp"), "c").unwrap();
        fs::write(root.join("sub").join("d.png"), "d").unwrap();
        let root = conform(&root.to_string_lossy());
        (dir, root)
    }

    fn collect(root: &str, skip: &SkipPattern, recursive: bool) -> Vec<String> {
        FileSystemSource::new()
            .identifiers(root, skip, recursive)
            .unwrap()
            .map(|id| id.strip_prefix(root).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_recursive_walk_yields_files_sorted() {
        let (_dir, root) = tree();
        assert_eq!(
            collect(&root, &SkipPattern::none(), true),
            vec!["/a.carnivore.txt", "/b.txt", "/sub/c.tmp", "/sub/d.png"]
        );
    }

    #[test]
    fn test_shallow_listing_includes_directories() {
        let (_dir, root) = tree();
        assert_eq!(
            collect(&root, &SkipPattern::none(), false),
            vec!["/a.carnivore.txt", "/b.txt", "/sub"]
        );
    }

    #[test]
    fn test_skip_pattern_applied() {
        let (_dir, root) = tree();
        let skip = SkipPattern::compile(&[r"\.tmp$"]);
        assert_eq!(
            collect(&root, &skip, true),
            vec!["/a.carnivore.txt", "/b.txt", "/sub/d.png"]
        );
    }

    #[test]
    fn test_empty_directory_is_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        assert_eq!(collect(&root, &SkipPattern::none(), true), Vec::<String>::new());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let source = FileSystemSource::new();
        assert!(!source.can_represent("/definitely/not/here"));
        assert!(source
            .identifiers("/definitely/not/here", &SkipPattern::none(), true)
            .is_err());
    }

    #[test]
    fn test_above_lists_ancestors_nearest_first() {
        let source = FileSystemSource::new();
        assert_eq!(source.above("/data/dinos/rex"), vec!["/data/dinos", "/data"]);
        assert_eq!(source.above(r"C:\data\dinos"), vec!["C:/data"]);
    }

    #[test]
    fn test_below_lists_subdirectories() {
        let (_dir, root) = tree();
        assert_eq!(FileSystemSource::new().below(&root), vec![format!("{}/sub", root)]);
        assert!(FileSystemSource::new().below("/definitely/not/here").is_empty());
    }

    #[test]
    fn test_check_judges_absolute_paths_only() {
        let (_dir, root) = tree();
        let source = FileSystemSource::new();
        assert_eq!(source.check(&format!("{}/b.txt", root)), Validity::Valid);
        assert_eq!(source.check(&format!("{}/gone.txt", root)), Validity::NotValid);
        assert_eq!(source.check("Z:/definitely/not/here.txt"), Validity::NotValid);
        assert_eq!(source.check("relative/b.txt"), Validity::Unknown);
        assert_eq!(source.check("https://host/b.txt"), Validity::Unknown);
    }
}
