//! Plugin discovery: plugin locations → registry entries
//!
//! A plugin location is a directory holding trait manifests (`*.toml`), each
//! declaring one or more `[[trait]]` tables. Discovery is a deterministic
//! pass over the file system that lives outside the engine: locations are
//! visited in the order given, files inside a location in sorted path order.
//! A manifest that cannot be read, parsed or compiled is logged and skipped.
//!
//! ```toml
//! [[trait]]
//! kind = "carnivore"
//! priority = 10
//! pattern = '(carnivore|omnivore).*\.'
//! tags = ["carnivore", "meat", "hunter"]
//! ```

use super::builtin::{PatternTrait, PatternTraitSpec};
use super::registry::TraitRegistry;
use crate::error::{LatticeError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extension of trait manifests
pub const MANIFEST_EXTENSION: &str = "toml";

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "trait")]
    traits: Vec<PatternTraitSpec>,
}

/// Outcome of one discovery pass
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Manifests that contributed traits, in visit order
    pub manifests: Vec<PathBuf>,
    /// Number of traits registered
    pub traits: usize,
    /// Manifests or locations that were skipped
    pub failures: Vec<LatticeError>,
}

/// Compile every trait declared in one manifest file
pub fn load_manifest(path: &Path) -> Result<Vec<PatternTrait>> {
    let contents = std::fs::read_to_string(path)?;
    let manifest: Manifest = toml::from_str(&contents).map_err(|e| LatticeError::Manifest {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    manifest
        .traits
        .into_iter()
        .map(|spec| {
            let kind = spec.kind.clone();
            PatternTrait::compile(spec).map_err(|e| LatticeError::Manifest {
                path: path.display().to_string(),
                message: format!("trait '{}': {}", kind, e),
            })
        })
        .collect()
}

/// Manifest files below one location, sorted
fn manifest_paths(location: &Path) -> Vec<PathBuf> {
    WalkDir::new(location)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable plugin path: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION))
        .collect()
}

/// Register the traits of every manifest found under `locations`
pub fn discover_into(registry: &mut TraitRegistry, locations: &[String]) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    for location in locations {
        let root = Path::new(location);
        if !root.is_dir() {
            tracing::warn!("Plugin location {} is not a directory, skipping", location);
            report.failures.push(LatticeError::Manifest {
                path: location.clone(),
                message: "not a directory".to_string(),
            });
            continue;
        }

        for path in manifest_paths(root) {
            match load_manifest(&path) {
                Ok(traits) => {
                    tracing::debug!("Loaded {} trait(s) from {}", traits.len(), path.display());
                    report.traits += traits.len();
                    for t in traits {
                        registry.register(t);
                    }
                    report.manifests.push(path);
                }
                Err(e) => {
                    tracing::warn!("Skipping plugin manifest: {}", e);
                    report.failures.push(e);
                }
            }
        }
    }

    report
}

/// Build a complete registry: built-ins first, then plugin manifests
pub fn discover(locations: &[String]) -> (TraitRegistry, DiscoveryReport) {
    let mut registry = TraitRegistry::with_builtins();
    let report = discover_into(&mut registry, locations);
    (registry, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DINOS: &str = r#"
[[trait]]
kind = "carnivore"
priority = 10
pattern = '(carnivore|omnivore).*\.'
tags = ["carnivore", "meat"]

[[trait]]
kind = "herbivore"
priority = 10
pattern = '(herbivore|omnivore).*\.'
tags = ["herbivore", "plants"]
"#;

    fn location(dir: &tempfile::TempDir) -> Vec<String> {
        vec![dir.path().to_string_lossy().to_string()]
    }

    #[test]
    fn test_discovers_manifests_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_dinos.toml"), DINOS).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested").join("image.toml"),
            "[[trait]]\nkind = \"image\"\npattern = '\\.png$'\n",
        )
        .unwrap();
        fs::write(dir.path().join("a_notes.txt"), "not a manifest").unwrap();

        let (registry, report) = discover(&location(&dir));

        assert!(report.failures.is_empty());
        assert_eq!(report.traits, 3);
        assert_eq!(report.manifests.len(), 2);
        assert!(report.manifests[0].ends_with("b_dinos.toml"));
        assert_eq!(registry.kinds(), vec!["carnivore", "file", "herbivore", "image"]);
    }

    #[test]
    fn test_discovery_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dinos.toml"), DINOS).unwrap();

        let (first, _) = discover(&location(&dir));
        let (second, _) = discover(&location(&dir));

        let seqs = |r: &TraitRegistry| {
            r.iter()
                .flat_map(|(kind, f)| f.iter().map(move |x| (kind.to_string(), x.seq)))
                .collect::<Vec<_>>()
        };
        assert_eq!(seqs(&first), seqs(&second));
    }

    #[test]
    fn test_bad_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_broken.toml"), "[[trait]\nkind=").unwrap();
        fs::write(
            dir.path().join("b_badregex.toml"),
            "[[trait]]\nkind = \"x\"\npattern = '(oops'\n",
        )
        .unwrap();
        fs::write(dir.path().join("c_dinos.toml"), DINOS).unwrap();

        let (registry, report) = discover(&location(&dir));

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.traits, 2);
        assert!(registry.kinds().contains(&"carnivore"));
        assert!(!registry.kinds().contains(&"x"));
    }

    #[test]
    fn test_missing_location_is_reported() {
        let (registry, report) = discover(&["/definitely/not/here".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(registry.kinds(), vec!["file"]);
    }
}
