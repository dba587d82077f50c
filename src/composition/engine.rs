//! Binding identifiers to views

use super::registry::{Registered, TraitRegistry};
use super::view::{BoundTrait, View};
use crate::error::LatticeError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds [`View`]s from the traits registered in a [`TraitRegistry`]
#[derive(Clone)]
pub struct CompositionEngine {
    registry: Arc<TraitRegistry>,
}

impl CompositionEngine {
    pub fn new(registry: Arc<TraitRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TraitRegistry> {
        &self.registry
    }

    /// Factories that take part in binding `identifier`, in evaluation order.
    ///
    /// Per kind, only the highest version whose `can_represent` holds
    /// survives (equal versions: the earlier registration). Survivors are
    /// sorted by priority descending with registration order as tie-break.
    pub fn select(&self, identifier: &str) -> Vec<Registered> {
        let mut winners: BTreeMap<&str, &Registered> = BTreeMap::new();

        for (kind, factories) in self.registry.iter() {
            for candidate in factories {
                if !candidate.factory.can_represent(identifier) {
                    continue;
                }
                let replace = match winners.get(kind) {
                    Some(current) => candidate.descriptor().version > current.descriptor().version,
                    None => true,
                };
                if replace {
                    winners.insert(kind, candidate);
                }
            }
        }

        let mut selected: Vec<Registered> = winners.into_values().cloned().collect();
        selected.sort_by(|a, b| {
            b.descriptor()
                .priority
                .cmp(&a.descriptor().priority)
                .then(a.seq.cmp(&b.seq))
        });
        selected
    }

    /// Bind every trait that can represent `identifier` into one view.
    ///
    /// Returns `None` when no trait claims the identifier. A factory that
    /// fails to instantiate is logged and left out of the view.
    pub fn bind(&self, identifier: &str) -> Option<View> {
        let mut traits = Vec::new();

        for registered in self.select(identifier) {
            let descriptor = registered.descriptor().clone();
            match registered.factory.bind(identifier) {
                Ok(instance) => traits.push(BoundTrait {
                    descriptor,
                    instance,
                }),
                Err(source) => {
                    let err = LatticeError::Trait {
                        kind: descriptor.kind,
                        operation: "bind",
                        source,
                    };
                    tracing::warn!(identifier = %identifier, "{}; trait left out of view", err);
                }
            }
        }

        if traits.is_empty() {
            tracing::debug!("No traits represent {}", identifier);
            return None;
        }

        let view = View::new(identifier.to_string(), traits);
        tracing::debug!("Compounded {} to {}", identifier, view);
        Some(view)
    }
}
