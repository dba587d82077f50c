//! Built-in traits
//!
//! - [`FileTrait`]: always-on trait for path-like identifiers with an
//!   extension (label = file name, mandatory tag = extension).
//! - [`PatternTrait`]: declarative trait driven by a regex over the
//!   identifier; this is what plugin manifests compile into.

use super::{Action, Contribution, DataTrait, FunctionMap, TraitDescriptor, TraitFactory};
use super::registry::TraitRegistry;
use crate::util::display_name;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Register every always-on trait
pub fn register_builtins(registry: &mut TraitRegistry) {
    registry.register(FileTrait::new());
}

// ─────────────────────────────────────────────────────────────────────────────
// File trait
// ─────────────────────────────────────────────────────────────────────────────

/// Represents any `/`-separated identifier whose name has an extension
pub struct FileTrait {
    descriptor: TraitDescriptor,
}

impl FileTrait {
    pub const KIND: &'static str = "file";

    pub fn new() -> Self {
        Self {
            descriptor: TraitDescriptor::new(Self::KIND, 1, 0),
        }
    }

    fn extension(identifier: &str) -> Option<&str> {
        let name = display_name(identifier);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }
}

impl Default for FileTrait {
    fn default() -> Self {
        Self::new()
    }
}

struct FileInstance {
    name: String,
    extension: String,
}

impl DataTrait for FileInstance {
    fn label(&self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.name.clone()))
    }

    fn mandatory_tags(&self) -> anyhow::Result<Vec<String>> {
        Ok(vec![self.extension.to_lowercase()])
    }
}

impl TraitFactory for FileTrait {
    fn descriptor(&self) -> &TraitDescriptor {
        &self.descriptor
    }

    fn can_represent(&self, identifier: &str) -> bool {
        identifier.contains('/') && Self::extension(identifier).is_some()
    }

    fn bind(&self, identifier: &str) -> anyhow::Result<Box<dyn DataTrait>> {
        let extension = Self::extension(identifier)
            .ok_or_else(|| anyhow::anyhow!("{} has no extension", identifier))?;
        Ok(Box::new(FileInstance {
            name: display_name(identifier).to_string(),
            extension: extension.to_string(),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern trait
// ─────────────────────────────────────────────────────────────────────────────

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Declarative trait definition, as found in `[[trait]]` manifest tables
#[derive(Debug, Clone, Deserialize)]
pub struct PatternTraitSpec {
    pub kind: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub priority: i32,
    /// Regex searched for anywhere in the identifier
    pub pattern: String,
    #[serde(default = "default_true")]
    pub case_insensitive: bool,
    /// Label template; `{name}` expands to the identifier's display name
    pub label: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Action name → description; invoking an action logs it
    #[serde(default)]
    pub functionality: BTreeMap<String, String>,
}

/// Trait compiled from a [`PatternTraitSpec`]
pub struct PatternTrait {
    descriptor: TraitDescriptor,
    pattern: Regex,
    spec: Arc<PatternTraitSpec>,
}

impl PatternTrait {
    pub fn compile(spec: PatternTraitSpec) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(&spec.pattern)
            .case_insensitive(spec.case_insensitive)
            .build()?;
        Ok(Self {
            descriptor: TraitDescriptor::new(spec.kind.clone(), spec.version, spec.priority),
            pattern,
            spec: Arc::new(spec),
        })
    }

    pub fn spec(&self) -> &PatternTraitSpec {
        &self.spec
    }
}

struct PatternInstance {
    identifier: String,
    spec: Arc<PatternTraitSpec>,
}

impl DataTrait for PatternInstance {
    fn label(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .spec
            .label
            .as_ref()
            .map(|template| template.replace("{name}", display_name(&self.identifier))))
    }

    fn icon(&self) -> anyhow::Result<Option<String>> {
        Ok(self.spec.icon.clone())
    }

    fn mandatory_tags(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.spec.tags.clone())
    }

    fn functionality(&self) -> anyhow::Result<FunctionMap> {
        Ok(self
            .spec
            .functionality
            .iter()
            .map(|(name, description)| {
                let action_name = name.clone();
                let action = Action::new(description.clone(), move |identifier| {
                    tracing::info!("{} invoked on {}", action_name, identifier);
                    Ok(())
                });
                (name.clone(), Contribution::Value(action))
            })
            .collect())
    }
}

impl TraitFactory for PatternTrait {
    fn descriptor(&self) -> &TraitDescriptor {
        &self.descriptor
    }

    fn can_represent(&self, identifier: &str) -> bool {
        self.pattern.is_match(identifier)
    }

    fn bind(&self, identifier: &str) -> anyhow::Result<Box<dyn DataTrait>> {
        Ok(Box::new(PatternInstance {
            identifier: identifier.to_string(),
            spec: self.spec.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CompositionEngine;

    fn carnivore_spec() -> PatternTraitSpec {
        toml::from_str(
            r#"
            kind = "carnivore"
            priority = 10
            pattern = '(carnivore|omnivore).*\.'
            label = "Carnivore: {name}"
            tags = ["carnivore", "meat", "hunter"]

            [functionality]
            feed_meat = "Feed this creature some meat"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_file_trait_claims_paths_with_extension() {
        let file = FileTrait::new();
        assert!(file.can_represent("/dinos/trex.png"));
        assert!(file.can_represent("C:/dinos/notes.TXT"));
        assert!(!file.can_represent("/dinos/README"));
        assert!(!file.can_represent("/dinos/.hidden"));
        assert!(!file.can_represent("uuid-1234.v2"));
    }

    #[test]
    fn test_file_trait_label_and_tag() {
        let instance = FileTrait::new().bind("/dinos/trex.PNG").unwrap();
        assert_eq!(instance.label().unwrap(), Some("trex.PNG".to_string()));
        assert_eq!(instance.mandatory_tags().unwrap(), vec!["png"]);
    }

    #[test]
    fn test_pattern_spec_defaults() {
        let spec = carnivore_spec();
        assert_eq!(spec.version, 1);
        assert!(spec.case_insensitive);
        assert!(spec.icon.is_none());
    }

    #[test]
    fn test_pattern_trait_matches_case_insensitive() {
        let carnivore = PatternTrait::compile(carnivore_spec()).unwrap();
        assert!(carnivore.can_represent("/dinos/Velociraptor.Carnivore.png"));
        assert!(carnivore.can_represent("/dinos/bear.omnivore.png"));
        assert!(!carnivore.can_represent("/dinos/stego.herbivore.png"));
    }

    #[test]
    fn test_pattern_trait_composes_with_file() {
        let mut registry = TraitRegistry::with_builtins();
        registry.register(PatternTrait::compile(carnivore_spec()).unwrap());
        let engine = CompositionEngine::new(Arc::new(registry));

        let view = engine.bind("/dinos/trex.carnivore.png").unwrap();
        assert_eq!(view.kinds(), vec!["carnivore", "file"]);
        assert_eq!(view.label(), Some("Carnivore: trex.carnivore.png".to_string()));
        assert_eq!(view.mandatory_tags(), vec!["carnivore", "meat", "hunter", "png"]);
        assert!(view.functionality().contains_key("feed_meat"));
    }

    #[test]
    fn test_invalid_pattern_fails_to_compile() {
        let mut spec = carnivore_spec();
        spec.pattern = "(unclosed".to_string();
        assert!(PatternTrait::compile(spec).is_err());
    }
}
