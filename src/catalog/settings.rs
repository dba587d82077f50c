//! Typed view over the catalog settings blob
//!
//! The blob is an open JSON object. The three keys the project works with
//! are typed; everything else is carried through untouched.

use super::SettingsMap;
use crate::error::LatticeError;
use crate::util::conform;
use serde::{Deserialize, Serialize};

/// Project-level settings stored inside the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Roots walked by `scan` when no locations are passed
    #[serde(default)]
    pub scan_locations: Vec<String>,

    /// Regexes; a discovered identifier matching any of them is skipped
    #[serde(default)]
    pub skip_regex: Vec<String>,

    /// Directories searched for trait manifests
    #[serde(default)]
    pub plugin_locations: Vec<String>,

    /// Keys owned by other callers
    #[serde(flatten)]
    pub extra: SettingsMap,
}

impl ProjectSettings {
    /// Parse the typed keys; a blob whose typed keys have the wrong shape
    /// is logged and replaced by defaults (extra keys kept)
    pub fn from_map(map: SettingsMap) -> Self {
        match serde_json::from_value(serde_json::Value::Object(map.clone())) {
            Ok(settings) => settings,
            Err(e) => {
                let err = LatticeError::Configuration(format!("invalid project settings: {}", e));
                tracing::warn!("{}; using defaults", err);
                let mut extra = map;
                for key in ["scan_locations", "skip_regex", "plugin_locations"] {
                    extra.remove(key);
                }
                Self {
                    extra,
                    ..Self::default()
                }
            }
        }
    }

    pub fn to_map(&self) -> SettingsMap {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => SettingsMap::new(),
        }
    }
}

/// Which location list of [`ProjectSettings`] an edit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationList {
    Scan,
    Skip,
    Plugin,
}

impl LocationList {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationList::Scan => "scan_locations",
            LocationList::Skip => "skip_regex",
            LocationList::Plugin => "plugin_locations",
        }
    }

    /// Locations are conformed; skip regexes are kept verbatim since `\`
    /// is an escape there
    fn normalize(&self, value: &str) -> String {
        match self {
            LocationList::Skip => value.to_string(),
            LocationList::Scan | LocationList::Plugin => conform(value),
        }
    }

    fn list_mut<'a>(&self, settings: &'a mut ProjectSettings) -> &'a mut Vec<String> {
        match self {
            LocationList::Scan => &mut settings.scan_locations,
            LocationList::Skip => &mut settings.skip_regex,
            LocationList::Plugin => &mut settings.plugin_locations,
        }
    }
}

impl ProjectSettings {
    /// Append a value; returns false when already present
    pub fn add(&mut self, list: LocationList, value: &str) -> bool {
        let value = list.normalize(value);
        let values = list.list_mut(self);
        if values.contains(&value) {
            return false;
        }
        values.push(value);
        true
    }

    /// Remove a value; returns false when it was not present
    pub fn remove(&mut self, list: LocationList, value: &str) -> bool {
        let value = list.normalize(value);
        let values = list.list_mut(self);
        let before = values.len();
        values.retain(|v| v != &value);
        values.len() != before
    }
}
