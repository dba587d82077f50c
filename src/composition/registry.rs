//! Registry of trait factories keyed by kind
//!
//! The registry is an explicit, injectable value: built-ins, caller-supplied
//! factories and plugin manifests are all registered into it before it is
//! shared with the engine. Registration order is recorded and used as the
//! tie-break wherever two factories are otherwise equal.

use super::{TraitDescriptor, TraitFactory};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A factory together with its registration sequence number
#[derive(Clone)]
pub struct Registered {
    pub seq: usize,
    pub factory: Arc<dyn TraitFactory>,
}

impl Registered {
    pub fn descriptor(&self) -> &TraitDescriptor {
        self.factory.descriptor()
    }
}

/// Mapping from trait kind to its factories, in registration order
#[derive(Clone, Default)]
pub struct TraitRegistry {
    kinds: BTreeMap<String, Vec<Registered>>,
    next_seq: usize,
}

impl TraitRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the always-on built-in traits
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::builtin::register_builtins(&mut registry);
        registry
    }

    /// Register a factory
    pub fn register(&mut self, factory: impl TraitFactory + 'static) {
        self.register_arc(Arc::new(factory));
    }

    /// Register a shared factory
    pub fn register_arc(&mut self, factory: Arc<dyn TraitFactory>) {
        let descriptor = factory.descriptor();
        tracing::trace!(
            kind = %descriptor.kind,
            version = descriptor.version,
            priority = descriptor.priority,
            "Registered trait"
        );
        let kind = descriptor.kind.clone();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.kinds
            .entry(kind)
            .or_default()
            .push(Registered { seq, factory });
    }

    /// Factories registered for one kind
    pub fn factories(&self, kind: &str) -> &[Registered] {
        self.kinds.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate kinds with their factories, kinds in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Registered])> {
        self.kinds.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> Vec<&str> {
        self.kinds.keys().map(String::as_str).collect()
    }

    /// Total number of registered factories
    pub fn len(&self) -> usize {
        self.kinds.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
