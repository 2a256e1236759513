use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Capture name to output category renames, e.g. `variable.builtin` to
/// `variable` for consumers with a flat category set.
pub type CaptureMappings = HashMap<String, String>;

/// Engine configuration loaded from a YAML file.
///
/// Everything is optional; the empty config is valid and leaves capture names
/// untouched with no grammar kind checking.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Capture-to-category renames applied during classification.
    #[serde(default)]
    pub capture_mappings: CaptureMappings,
    /// Per-grammar node kind inventories, used to warn on stale queries.
    #[serde(default)]
    pub known_kinds: HashMap<String, Vec<String>>,
}

impl Config {
    /// Node kind inventory for one grammar, if configured.
    pub fn known_kinds_for(&self, grammar: &str) -> Option<HashSet<String>> {
        self.known_kinds
            .get(grammar)
            .map(|kinds| kinds.iter().cloned().collect())
    }

    pub fn mappings(&self) -> Option<&CaptureMappings> {
        if self.capture_mappings.is_empty() {
            None
        } else {
            Some(&self.capture_mappings)
        }
    }
}

/// Load config from the given path. `None` yields the default config.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(config_path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config {}", config_path.display()))?;
    let config: Config = serde_yml::from_str(&contents)
        .with_context(|| format!("failed to parse config {}", config_path.display()))?;
    Ok(config)
}
