//! Rule-set configuration files.
//!
//! A configuration file carries a list of rule-set definitions under a
//! top-level `rule_sets` key, in TOML, YAML, or JSON. Loading only
//! deserializes; definitions are compiled (and can still be rejected)
//! when they reach the registry.

use crate::registry::RegistrySnapshot;
use crate::rules::RuleSetDefinition;
use crate::{MatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration file shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetConfig {
    #[serde(default)]
    pub rule_sets: Vec<RuleSetDefinition>,
}

impl RuleSetConfig {
    /// Load from a file, picking the format from the extension
    /// (`.toml`, `.yaml`/`.yml`, `.json`).
    ///
    /// # Errors
    ///
    /// Returns `Config` when the file cannot be read, the extension is
    /// not recognized, or the contents do not deserialize.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(MatchError::config(format!(
                "cannot infer config format of {}: expected a .toml, .yaml, .yml, or .json file",
                path.display()
            ))),
        }
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        toml::from_str(&content).map_err(|e| {
            MatchError::config_with_source(format!("invalid TOML in {}", path.as_ref().display()), e)
        })
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            MatchError::config_with_source(format!("invalid YAML in {}", path.as_ref().display()), e)
        })
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            MatchError::config_with_source(format!("invalid JSON in {}", path.as_ref().display()), e)
        })
    }

    /// Compile every definition into a ready-to-use snapshot.
    ///
    /// # Errors
    ///
    /// Propagates the first compilation failure, including duplicate
    /// ids across the file.
    pub fn into_snapshot(self) -> Result<RegistrySnapshot> {
        RegistrySnapshot::from_definitions(self.rule_sets)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        MatchError::config_with_source(format!("failed to read config file {}", path.display()), e)
    })
}
