//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

impl Config {
    /// Serialize the catalog path, commented out when unset
    fn catalog_path_to_toml(&self) -> String {
        match &self.catalog_path {
            Some(path) => format!("catalog_path = {:?}", path.display().to_string()),
            None => "# catalog_path = \"~/dinos.lattice\"".to_string(),
        }
    }

    /// Serialize config to TOML string
    pub fn to_toml(&self) -> String {
        format!(
            r#"# lattice configuration

# Catalog used when --catalog is not given (LATTICE_CATALOG overrides)
{catalog_path}

# Result limit for `find` without --limit (LATTICE_LIMIT overrides)
default_limit = {limit}

# Plugin locations searched for every catalog, after the catalog's own
plugin_locations = {plugins:?}

# Scan defaults
[scan]
recursive = {recursive}
# Identifiers inserted per discovery transaction
batch_size = {batch_size}

# Logging configuration (RUST_LOG > LATTICE_LOG > level)
[logging]
level = {log_level:?}
# JSON file logging (in addition to stderr)
file_enabled = {log_file_enabled}
file_dir = {log_file_dir:?}
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = {log_file_prefix:?}
"#,
            catalog_path = self.catalog_path_to_toml(),
            limit = self.default_limit,
            plugins = self.plugin_locations,
            recursive = self.scan.recursive,
            batch_size = self.scan.batch_size,
            log_level = self.logging.level,
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = self.logging.file_dir.display().to_string(),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = self.logging.file_prefix,
        )
    }
}
