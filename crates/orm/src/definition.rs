//! Model definitions as loaded from configuration files
//!
//! A definition file holds one model: its table, whether the table lives in
//! the shared site schema, and its attribute declarations. Files are YAML or
//! JSON; the file stem is the model key.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attributes::{RawAttribute, CREATED_AT, UPDATED_AT};
use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub table_name: String,
    /// Table lives in the shared schema rather than the tenant's database
    #[serde(default)]
    pub site_only: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, RawAttribute>,
}

impl ModelDefinition {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            site_only: false,
            attributes: BTreeMap::new(),
        }
    }

    pub fn site_only(mut self, site_only: bool) -> Self {
        self.site_only = site_only;
        self
    }

    pub fn attribute(mut self, name: &str, attribute: impl Into<RawAttribute>) -> Self {
        self.attributes.insert(name.to_string(), attribute.into());
        self
    }

    /// Switch off the implicit `createdAt`/`updatedAt` columns
    pub fn without_timestamps(self) -> Self {
        self.attribute(CREATED_AT, RawAttribute::Toggle(false))
            .attribute(UPDATED_AT, RawAttribute::Toggle(false))
    }

    pub fn from_yaml_str(source: &str) -> ModelResult<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Parse a document mapping model keys to definitions.
    ///
    /// YAML is a superset of JSON, so both formats are accepted.
    pub fn map_from_str(source: &str) -> ModelResult<BTreeMap<String, Self>> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Load one definition, picking the format from the file extension.
    pub fn load_file(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        match extension(path) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Err(ModelError::Configuration(format!(
                "Unsupported model definition file: {}",
                path.display()
            ))),
        }
    }

    /// Load every `*.yaml`, `*.yml` and `*.json` file in `dir`, keyed by file stem.
    pub fn load_dir(dir: &Path) -> ModelResult<BTreeMap<String, Self>> {
        let mut definitions = BTreeMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !matches!(extension(&path), Some("json" | "yaml" | "yml")) {
                continue;
            }

            let key = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| {
                    ModelError::Configuration(format!("Invalid file name: {}", path.display()))
                })?
                .to_string();

            tracing::debug!("Loading model definition '{}' from {}", key, path.display());
            definitions.insert(key, Self::load_file(&path)?);
        }

        Ok(definitions)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
