//! Trait composition: capability modules merged into per-identifier views
//!
//! An identifier can be represented by several independently authored traits
//! at once. Binding selects every trait that claims the identifier, keeps the
//! highest version of each kind, orders the survivors by priority and hands
//! back a [`View`] whose operations merge the traits' outputs under the
//! policies declared in [`merge`].
//!
//! # Architecture
//!
//! ```text
//! TraitRegistry (kind → [TraitFactory, ...])
//!     │
//!     └──→ CompositionEngine::bind(identifier)
//!             │
//!             ├──→ can_represent filter
//!             ├──→ highest version per kind
//!             ├──→ priority sort (stable)
//!             └──→ View [DataTrait₁, DataTrait₂, ...] + policy table
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod builtin;
pub mod engine;
pub mod merge;
pub mod plugins;
pub mod registry;
pub mod view;

pub use engine::CompositionEngine;
pub use merge::{Contribution, MergePolicy, Operation};
pub use registry::TraitRegistry;
pub use view::View;

/// Static description of a trait kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitDescriptor {
    /// Unique name of the capability ("carnivore", "file", ...)
    pub kind: String,
    /// Only the highest version of a kind takes part in a binding
    pub version: u32,
    /// Higher values are evaluated first
    pub priority: i32,
}

impl TraitDescriptor {
    pub fn new(kind: impl Into<String>, version: u32, priority: i32) -> Self {
        Self {
            kind: kind.into(),
            version,
            priority,
        }
    }
}

/// Handler invoked with the identifier of the view it was obtained from
pub type ActionHandler = dyn Fn(&str) -> anyhow::Result<()> + Send + Sync;

/// A named piece of functionality exposed by a trait
#[derive(Clone)]
pub struct Action {
    description: String,
    handler: Arc<ActionHandler>,
}

impl Action {
    pub fn new<F>(description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn invoke(&self, identifier: &str) -> anyhow::Result<()> {
        (self.handler)(identifier)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Output of the `functionality` operation of one trait
pub type FunctionMap = BTreeMap<String, Contribution<Action>>;

/// Capability interface of a trait bound to one identifier.
///
/// Every operation has an empty default so a trait implements only what it
/// contributes. Errors are isolated by the view: a failing operation drops
/// this trait's contribution and the merge carries on with the others.
pub trait DataTrait: Send + Sync {
    /// Pretty name (first-non-empty)
    fn label(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Icon reference (first-non-empty)
    fn icon(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Tags every identifier with this trait must carry (union-unique)
    fn mandatory_tags(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Named callables (shallow-merge-map)
    fn functionality(&self) -> anyhow::Result<FunctionMap> {
        Ok(FunctionMap::new())
    }
}

/// Registered producer of one trait kind.
pub trait TraitFactory: Send + Sync {
    fn descriptor(&self) -> &TraitDescriptor;

    /// Whether this trait can represent the identifier. Called for every
    /// registered factory on every bind, so keep it cheap.
    fn can_represent(&self, identifier: &str) -> bool;

    /// Instantiate the trait for one identifier
    fn bind(&self, identifier: &str) -> anyhow::Result<Box<dyn DataTrait>>;
}
