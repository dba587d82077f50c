//! Project facade: one catalog, its traits, sources and subscribers
//!
//! A project is what callers open. It owns the catalog handle, a registry
//! rebuilt from plugin locations whenever they change, the discovery
//! sources used by `scan`/`explore`, and the event subscribers.
//!
//! Registry rebuild order is fixed: built-in traits, then traits injected
//! with [`Project::register_trait`], then manifests found in the stored
//! plugin locations followed by the extra locations from configuration.

use crate::catalog::{
    Catalog, IntoTags, LocationList, ProjectSettings, SettingsMap, TagQuery,
};
use crate::composition::plugins::{self, DiscoveryReport};
use crate::composition::{CompositionEngine, TraitFactory, TraitRegistry, View};
use crate::discovery::{DiscoverySource, FileSystemSource, SkipPattern};
use crate::error::{LatticeError, Result};
use crate::events::{EventBus, EventSink};
use crate::logging::LogContext;
use crate::scan::{CancelToken, ScanCoordinator, ScanOptions, ScanReport};
use crate::util::conform;
use std::path::{Path, PathBuf};
use std::sync::Arc;


/// File extension of catalog stores
pub const CATALOG_EXTENSION: &str = "lattice";

/// An open catalog together with everything needed to fill and query it
pub struct Project {
    catalog: Catalog,
    engine: CompositionEngine,
    injected: Vec<Arc<dyn TraitFactory>>,
    extra_plugin_locations: Vec<String>,
    sources: Vec<Arc<dyn DiscoverySource>>,
    events: EventBus,
    options: ScanOptions,
}

impl Project {
    /// Open an existing catalog
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LatticeError::Configuration(format!(
                "catalog {} does not exist",
                path.display()
            )));
        }

        let project = Self::load(path.to_path_buf())?;
        if !project.catalog.is_initialized() {
            return Err(LatticeError::Configuration(format!(
                "{} is not a lattice catalog",
                path.display()
            )));
        }
        Ok(project)
    }

    /// Create (or re-initialize) a catalog and store its plugin locations.
    ///
    /// `.lattice` is appended to `path` when it does not already end with it.
    pub fn create<S: AsRef<str>>(path: impl AsRef<Path>, plugin_locations: &[S]) -> Result<Self> {
        let mut path = path.as_ref().to_path_buf();
        if !path.to_string_lossy().ends_with(CATALOG_EXTENSION) {
            let mut with_ext = path.into_os_string();
            with_ext.push(format!(".{}", CATALOG_EXTENSION));
            path = PathBuf::from(with_ext);
        }

        let mut project = Self::load(path)?;
        project.catalog.create()?;
        for location in plugin_locations {
            project.edit_settings(LocationList::Plugin, location.as_ref(), true);
        }
        project.reload_plugins();

        tracing::info!("Created catalog {}", project.path().display());
        Ok(project)
    }

    fn load(path: PathBuf) -> Result<Self> {
        let ctx = Arc::new(LogContext::new(path.display().to_string()));
        let catalog = Catalog::open(&path, ctx)?;

        let mut project = Self {
            catalog,
            engine: CompositionEngine::new(Arc::new(TraitRegistry::with_builtins())),
            injected: Vec::new(),
            extra_plugin_locations: Vec::new(),
            sources: vec![Arc::new(FileSystemSource::new()) as Arc<dyn DiscoverySource>],
            events: EventBus::new(),
            options: ScanOptions::default(),
        };

        // Only a store with a schema has plugin locations to read
        if project.catalog.is_initialized() {
            project.reload_plugins();
        }
        Ok(project)
    }

    pub fn path(&self) -> &Path {
        self.catalog.path()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn engine(&self) -> &CompositionEngine {
        &self.engine
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Traits, sources, subscribers
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a trait that survives plugin reloads
    pub fn register_trait(&mut self, factory: impl TraitFactory + 'static) {
        self.injected.push(Arc::new(factory));
        self.reload_plugins();
    }

    /// Plugin locations searched in addition to the stored ones
    pub fn set_extra_plugin_locations(&mut self, locations: Vec<String>) {
        self.extra_plugin_locations = locations.iter().map(|l| conform(l)).collect();
        self.reload_plugins();
    }

    /// Add a discovery source after the built-in file system source
    pub fn add_source(&mut self, source: impl DiscoverySource + 'static) {
        tracing::debug!("Added discovery source: {}", source.name());
        self.sources.push(Arc::new(source));
    }

    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.events.subscribe(Arc::new(sink));
    }

    pub fn scan_options(&self) -> &ScanOptions {
        &self.options
    }

    /// Batch size used by every later scan
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.options.batch_size = batch_size.max(1);
    }

    /// Rebuild the trait registry from built-ins, injected traits and
    /// plugin manifests, then swap it into the engine
    pub fn reload_plugins(&mut self) -> DiscoveryReport {
        let mut registry = TraitRegistry::with_builtins();
        for factory in &self.injected {
            registry.register_arc(factory.clone());
        }

        let mut locations = self.plugin_locations();
        for extra in &self.extra_plugin_locations {
            if !locations.contains(extra) {
                locations.push(extra.clone());
            }
        }

        let report = self
            .catalog
            .context()
            .in_scope(|| plugins::discover_into(&mut registry, &locations));

        tracing::debug!(
            "Loaded {} trait(s) from {} manifest(s), {} kind(s) registered",
            report.traits,
            report.manifests.len(),
            registry.kinds().len()
        );

        self.engine = CompositionEngine::new(Arc::new(registry));
        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Identifiers matching `tags`; see [`Catalog::find`]
    pub fn find(&self, tags: impl Into<TagQuery>, limit: Option<usize>) -> Vec<String> {
        self.catalog.find(tags, limit)
    }

    /// Composite view of every trait representing `identifier`
    pub fn get(&self, identifier: &str) -> Option<View> {
        let identifier = conform(identifier);
        self.catalog.context().in_scope(|| self.engine.bind(&identifier))
    }

    pub fn add(&self, identifier: &str) {
        self.catalog.add(identifier);
    }

    pub fn remove(&self, identifier: &str) {
        self.catalog.remove(identifier);
    }

    pub fn tag(&self, identifier: &str, tags: impl IntoTags) {
        self.catalog.tag(identifier, tags);
    }

    pub fn untag(&self, identifier: &str, tags: impl IntoTags) {
        self.catalog.untag(identifier, tags);
    }

    pub fn tags(&self, identifier: &str) -> Vec<String> {
        self.catalog.tags(identifier)
    }

    pub fn settings(&self) -> SettingsMap {
        self.catalog.settings()
    }

    pub fn save_settings(&self, settings: &SettingsMap) {
        self.catalog.save_settings(settings);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scanning
    // ─────────────────────────────────────────────────────────────────────────

    /// Scan `locations`, or the stored scan locations when empty
    pub fn scan(&self, locations: &[String], recursive: bool, full: bool) -> ScanReport {
        self.scan_with(locations, recursive, full, &CancelToken::new())
    }

    /// [`Project::scan`] with a caller-held cancellation token
    pub fn scan_with(
        &self,
        locations: &[String],
        recursive: bool,
        full: bool,
        cancel: &CancelToken,
    ) -> ScanReport {
        let locations: Vec<String> = if locations.is_empty() {
            self.scan_locations()
        } else {
            locations.iter().map(|l| conform(l)).collect()
        };

        let skip = SkipPattern::compile(&self.skip_regexes());
        let options = ScanOptions {
            recursive,
            full,
            ..self.options.clone()
        };

        let mut coordinator = ScanCoordinator::new(
            self.catalog.clone(),
            self.engine.clone(),
            self.sources.clone(),
            self.events.clone(),
        );
        coordinator.run(&locations, &skip, &options, cancel)
    }

    /// Locations above and below `location`, from the first source that
    /// can represent it
    pub fn explore(&self, location: &str) -> (Vec<String>, Vec<String>) {
        let location = conform(location);
        self.sources
            .iter()
            .find(|source| source.can_represent(&location))
            .map(|source| (source.above(&location), source.below(&location)))
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settings-backed lists
    // ─────────────────────────────────────────────────────────────────────────

    pub fn scan_locations(&self) -> Vec<String> {
        self.catalog.project_settings().scan_locations
    }

    pub fn add_scan_location(&self, location: &str) {
        self.edit_settings(LocationList::Scan, location, true);
    }

    pub fn remove_scan_location(&self, location: &str) {
        self.edit_settings(LocationList::Scan, location, false);
    }

    pub fn skip_regexes(&self) -> Vec<String> {
        self.catalog.project_settings().skip_regex
    }

    pub fn add_skip_regex(&self, pattern: &str) {
        self.edit_settings(LocationList::Skip, pattern, true);
    }

    pub fn remove_skip_regex(&self, pattern: &str) {
        self.edit_settings(LocationList::Skip, pattern, false);
    }

    pub fn plugin_locations(&self) -> Vec<String> {
        self.catalog.project_settings().plugin_locations
    }

    /// Store a plugin location and reload traits
    pub fn add_plugin_location(&mut self, location: &str) {
        if self.edit_settings(LocationList::Plugin, location, true) {
            self.reload_plugins();
        }
    }

    /// Forget a plugin location and reload traits
    pub fn remove_plugin_location(&mut self, location: &str) {
        if self.edit_settings(LocationList::Plugin, location, false) {
            self.reload_plugins();
        }
    }

    /// Add or remove one value; returns whether the stored list changed
    fn edit_settings(&self, list: LocationList, value: &str, add: bool) -> bool {
        let mut settings: ProjectSettings = self.catalog.project_settings();
        let changed = if add {
            settings.add(list, value)
        } else {
            settings.remove(list, value)
        };

        if changed {
            self.catalog.save_project_settings(&settings);
            tracing::debug!(
                "{} {} {}",
                if add { "Added" } else { "Removed" },
                value,
                list.as_str()
            );
        } else {
            tracing::debug!("{} unchanged for {}", list.as_str(), value);
        }
        changed
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("path", &self.catalog.path())
            .field("sources", &self.sources.len())
            .field("sinks", &self.events.len())
            .finish()
    }
}
