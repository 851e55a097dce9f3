//! Model Registry - compiled model definitions shared by every request
//!
//! Building the registry normalizes every definition, resolves every
//! relationship and synthesizes the join models of `many:many` connections.
//! A definition that cannot be interpreted fails the build, so a running
//! service never meets one mid-request.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::attributes::AttributeSet;
use crate::config::OrmConfig;
use crate::definition::ModelDefinition;
use crate::error::{ModelError, ModelResult};
use crate::model::lifecycle::HookPipeline;
use crate::relationships::{join_definition, ConnectionInfo, ConnectionType, RelationshipGraph};
use crate::security::validate_identifier;

/// A definition after normalization, ready to back a `Model`
#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub key: String,
    pub definition: ModelDefinition,
    pub attributes: AttributeSet,
    pub hooks: HookPipeline,
    /// Synthesized join model of a `many:many` connection
    pub is_join: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<CompiledModel>>,
    graph: RelationshipGraph,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Compile every definition file in `dir`, keyed by file stem.
    pub fn load_dir(dir: &Path) -> ModelResult<Self> {
        ModelRegistryBuilder::load_dir(dir)?.build()
    }

    /// Compile the definitions found in the configured models directory.
    pub fn from_config(config: &OrmConfig) -> ModelResult<Self> {
        let dir = config
            .models_dir
            .as_deref()
            .ok_or_else(|| ModelError::Configuration("ORM_MODELS_DIR is not set".to_string()))?;
        Self::load_dir(dir)
    }

    /// Keys of all models, declared and synthesized
    pub fn model_keys(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.models.contains_key(key)
    }

    pub fn definition(&self, key: &str) -> Option<&ModelDefinition> {
        self.models.get(key).map(|model| &model.definition)
    }

    pub fn compiled(&self, key: &str) -> ModelResult<Arc<CompiledModel>> {
        self.models
            .get(key)
            .cloned()
            .ok_or_else(|| ModelError::UnknownModel(key.to_string()))
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn connection(&self, model: &str, field: &str) -> Option<&ConnectionInfo> {
        self.graph.connection(model, field)
    }
}

#[derive(Debug, Default)]
pub struct ModelRegistryBuilder {
    definitions: BTreeMap<String, ModelDefinition>,
    hooks: BTreeMap<String, HookPipeline>,
}

impl ModelRegistryBuilder {
    /// Start from every definition file in `dir`
    pub fn load_dir(dir: &Path) -> ModelResult<Self> {
        Ok(Self {
            definitions: ModelDefinition::load_dir(dir)?,
            hooks: BTreeMap::new(),
        })
    }

    pub fn register(mut self, key: impl Into<String>, definition: ModelDefinition) -> Self {
        self.definitions.insert(key.into(), definition);
        self
    }

    /// Register every definition of a map document (see
    /// [`ModelDefinition::map_from_str`]).
    pub fn register_all(mut self, definitions: BTreeMap<String, ModelDefinition>) -> Self {
        self.definitions.extend(definitions);
        self
    }

    /// Attach lifecycle hooks to a model
    pub fn hooks(mut self, key: impl Into<String>, hooks: HookPipeline) -> Self {
        self.hooks.insert(key.into(), hooks);
        self
    }

    pub fn build(self) -> ModelResult<ModelRegistry> {
        let ModelRegistryBuilder {
            definitions,
            mut hooks,
        } = self;

        if let Some(key) = hooks.keys().find(|key| !definitions.contains_key(*key)) {
            return Err(ModelError::UnknownModel(key.clone()));
        }

        let mut attribute_sets = BTreeMap::new();
        for (key, definition) in &definitions {
            attribute_sets.insert(key.clone(), compile_attributes(key, definition)?);
        }

        let graph = RelationshipGraph::build(&attribute_sets)?;

        let mut joins = BTreeMap::new();
        for key in attribute_sets.keys() {
            for (_, info) in graph.connections(key) {
                if info.connection_type != ConnectionType::ManyToMany {
                    continue;
                }
                let site_only = definitions[key].site_only
                    && definitions
                        .get(&info.other_model)
                        .map(|other| other.site_only)
                        .unwrap_or(false);
                let (join_key, join) = join_definition(key, info, site_only)?;
                if definitions.contains_key(&join_key) || joins.contains_key(&join_key) {
                    continue;
                }
                tracing::debug!("Synthesized join model '{}'", join_key);
                joins.insert(join_key, join);
            }
        }

        let mut models = BTreeMap::new();
        for (join_key, join) in joins {
            let attributes = compile_attributes(&join_key, &join)?;
            models.insert(
                join_key.clone(),
                Arc::new(CompiledModel {
                    key: join_key.clone(),
                    definition: join,
                    attributes,
                    hooks: HookPipeline::default(),
                    is_join: true,
                }),
            );
        }

        // Both maps hold the same keys in the same order
        for ((key, definition), (_, attributes)) in definitions.into_iter().zip(attribute_sets) {
            models.insert(
                key.clone(),
                Arc::new(CompiledModel {
                    hooks: hooks.remove(&key).unwrap_or_default(),
                    key,
                    definition,
                    attributes,
                    is_join: false,
                }),
            );
        }

        Ok(ModelRegistry { models, graph })
    }
}

fn compile_attributes(key: &str, definition: &ModelDefinition) -> ModelResult<AttributeSet> {
    let attributes = AttributeSet::normalize(key, &definition.attributes)?;
    for (name, attribute) in attributes.iter() {
        validate_identifier(&attribute.column_name)
            .map_err(|e| ModelError::definition(key, name.as_str(), e.to_string()))?;
    }
    Ok(attributes)
}
