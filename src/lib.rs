// Lattice - a tag catalog for file-like identifiers, with composable traits
//
// Architecture:
// - Catalog (rusqlite + r2d2): identifiers, tags and per-catalog settings
// - Composition: independently authored traits merged into one View per identifier
// - Discovery: sources that enumerate and validate identifiers below a root
// - Scan: discovery → catalog → composition → tags → pruning, with events
// - Project: the facade callers open; ties all of the above to one store

pub mod catalog;
pub mod composition;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod logging;
pub mod project;
pub mod scan;
pub mod util;

pub use catalog::{Catalog, CatalogEntry, TagQuery};
pub use composition::{CompositionEngine, TraitFactory, TraitRegistry, View};
pub use config::Config;
pub use discovery::{DiscoverySource, FileSystemSource, Validity};
pub use error::{LatticeError, Result};
pub use events::{CatalogEvent, EventSink};
pub use project::Project;
pub use scan::{CancelToken, ScanReport};
