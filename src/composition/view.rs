//! Views: the runtime composite of every trait representing one identifier

use super::merge::{first_non_empty, shallow_merge, union_unique, MergePolicy, Operation};
use super::{Action, DataTrait, TraitDescriptor};
use crate::catalog::{Catalog, IntoTags};
use crate::error::LatticeError;
use crate::util::normalize_tags;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// One trait instance inside a view
pub(crate) struct BoundTrait {
    pub descriptor: TraitDescriptor,
    pub instance: Box<dyn DataTrait>,
}

/// Ordered composite of trait instances for one identifier.
///
/// Traits are held in evaluation order (priority descending). Views are
/// ephemeral: build one with [`CompositionEngine::bind`] whenever needed.
///
/// [`CompositionEngine::bind`]: super::CompositionEngine::bind
pub struct View {
    identifier: String,
    traits: Vec<BoundTrait>,
    failures: AtomicU64,
}

impl View {
    pub(crate) fn new(identifier: String, traits: Vec<BoundTrait>) -> Self {
        Self {
            identifier,
            traits,
            failures: AtomicU64::new(0),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Trait kinds in evaluation order
    pub fn kinds(&self) -> Vec<&str> {
        self.traits.iter().map(|t| t.descriptor.kind.as_str()).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &TraitDescriptor> {
        self.traits.iter().map(|t| &t.descriptor)
    }

    pub fn policy(&self, operation: Operation) -> MergePolicy {
        operation.policy()
    }

    /// Number of trait operations that failed on this view so far
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn label(&self) -> Option<String> {
        first_non_empty(self.evaluate(Operation::Label, |t| t.label()))
    }

    pub fn icon(&self) -> Option<String> {
        first_non_empty(self.evaluate(Operation::Icon, |t| t.icon()))
    }

    /// Tags every trait of this view demands, lowercased, first-seen order
    pub fn mandatory_tags(&self) -> Vec<String> {
        let merged = union_unique(self.evaluate(Operation::MandatoryTags, |t| t.mandatory_tags()));
        normalize_tags(merged)
    }

    /// Functionality of every trait, higher priority claiming keys first
    pub fn functionality(&self) -> BTreeMap<String, Action> {
        shallow_merge(self.evaluate(Operation::Functionality, |t| t.functionality()))
    }

    /// Tags currently assigned to this identifier in `catalog`
    pub fn tags(&self, catalog: &Catalog) -> Vec<String> {
        catalog.tags(&self.identifier)
    }

    pub fn tag(&self, catalog: &Catalog, tags: impl IntoTags) {
        catalog.tag(&self.identifier, tags);
    }

    pub fn untag(&self, catalog: &Catalog, tags: impl IntoTags) {
        catalog.untag(&self.identifier, tags);
    }

    /// Lazily evaluate one operation across traits in priority order.
    ///
    /// A trait whose operation fails is logged and skipped; the iterator
    /// continues with the next trait.
    fn evaluate<'a, T, F>(&'a self, operation: Operation, f: F) -> impl Iterator<Item = T> + 'a
    where
        F: Fn(&dyn DataTrait) -> anyhow::Result<T> + 'a,
        T: 'a,
    {
        self.traits.iter().filter_map(move |bound| {
            match f(bound.instance.as_ref()) {
                Ok(value) => Some(value),
                Err(source) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    let err = LatticeError::Trait {
                        kind: bound.descriptor.kind.clone(),
                        operation: operation.as_str(),
                        source,
                    };
                    tracing::warn!(
                        identifier = %self.identifier,
                        "{}; contribution dropped",
                        err
                    );
                    None
                }
            }
        })
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "View: {} [{}]", self.identifier, self.kinds().join("; "))
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("identifier", &self.identifier)
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::composition::testing::StubTrait;
    use crate::composition::{CompositionEngine, Contribution, Operation, TraitRegistry};
    use crate::logging::{CaptureLayer, LogBuffer, LogLevel};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    fn engine(traits: Vec<StubTrait>) -> CompositionEngine {
        let mut registry = TraitRegistry::new();
        for t in traits {
            registry.register(t);
        }
        CompositionEngine::new(Arc::new(registry))
    }

    #[test]
    fn test_label_first_non_empty_in_priority_order() {
        let engine = engine(vec![
            StubTrait::new("file", 1, 1, "rex").label("trex.png"),
            StubTrait::new("carnivore", 1, 10, "rex"),
            StubTrait::new("image", 1, 5, "rex").label("T-Rex"),
        ]);
        let view = engine.bind("/dinos/rex").unwrap();
        assert_eq!(view.kinds(), vec!["carnivore", "image", "file"]);
        assert_eq!(view.label(), Some("T-Rex".to_string()));
    }

    #[test]
    fn test_mandatory_tags_union_unique_lowercased() {
        let engine = engine(vec![
            StubTrait::new("carnivore", 1, 10, "rex").tags(&["Carnivore", "meat"]),
            StubTrait::new("hunter", 1, 5, "rex").tags(&["meat", "hunter"]),
        ]);
        let view = engine.bind("rex").unwrap();
        assert_eq!(view.mandatory_tags(), vec!["carnivore", "meat", "hunter"]);
    }

    #[test]
    fn test_functionality_higher_priority_keeps_key() {
        let engine = engine(vec![
            StubTrait::new("low", 1, 1, "rex")
                .function("feed", Contribution::Value("low feed"))
                .function("pet", Contribution::Value("low pet")),
            StubTrait::new("high", 1, 9, "rex")
                .function("feed", Contribution::Value("high feed"))
                .function("pet", Contribution::Skip),
        ]);
        let view = engine.bind("rex").unwrap();
        let functions = view.functionality();
        assert_eq!(functions["feed"].description(), "high feed");
        assert_eq!(functions["pet"].description(), "low pet");
        assert!(functions["feed"].invoke("rex").is_ok());
    }

    #[test]
    fn test_failing_trait_is_isolated_and_logged() {
        let buffer = LogBuffer::new();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(buffer.clone()));

        let engine = engine(vec![
            StubTrait::new("broken", 1, 10, "rex")
                .tags(&["never"])
                .label("never")
                .failing(Operation::MandatoryTags)
                .failing(Operation::Label),
            StubTrait::new("carnivore", 1, 1, "rex")
                .tags(&["carnivore"])
                .label("Rex"),
        ]);

        tracing::subscriber::with_default(subscriber, || {
            let view = engine.bind("rex").unwrap();
            assert_eq!(view.mandatory_tags(), vec!["carnivore"]);
            assert_eq!(view.label(), Some("Rex".to_string()));
            assert_eq!(view.failures(), 2);
        });

        assert!(buffer.contains(LogLevel::Warn, "Trait 'broken' failed during mandatory_tags"));
        assert!(buffer.contains(LogLevel::Warn, "Trait 'broken' failed during label"));
    }

    #[test]
    fn test_display_lists_composition() {
        let engine = engine(vec![
            StubTrait::new("carnivore", 1, 10, "rex"),
            StubTrait::new("file", 1, 1, "rex"),
        ]);
        let view = engine.bind("/d/rex.png").unwrap();
        assert_eq!(view.to_string(), "View: /d/rex.png [carnivore; file]");
    }
}
