//! Model System - a compiled definition bound to one request
//!
//! - `crud_operations`: create, find, update, destroy
//! - `lifecycle`: before/after hooks
//! - `propagation`: relationship side effects of writes
//! - `values`: input filtering and row normalization

pub mod crud_operations;
pub mod lifecycle;
pub mod propagation;
pub mod values;

use std::sync::Arc;

use crate::attributes::AttributeSet;
use crate::context::RequestContext;
use crate::definition::ModelDefinition;
use crate::error::{ModelError, ModelResult};
use crate::query::executor::QueryExecutor;
use crate::query::table::resolve_table_name;
use crate::registry::CompiledModel;
use crate::relationships::{join_model_key, ConnectionInfo, ConnectionType};

pub use crate::backends::Record;
pub use crud_operations::CrudOperations;
pub use lifecycle::{HookPipeline, ModelHook};

/// A model as seen by one request
#[derive(Clone)]
pub struct Model {
    ctx: Arc<RequestContext>,
    compiled: Arc<CompiledModel>,
    executor: QueryExecutor,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("key", &self.compiled.key)
            .field("tenant", &self.ctx.tenant_id())
            .finish()
    }
}

impl Model {
    pub(crate) fn new(ctx: Arc<RequestContext>, compiled: Arc<CompiledModel>) -> Self {
        let executor = QueryExecutor::new(ctx.connection(), ctx.retry_policy().clone());
        Self {
            ctx,
            compiled,
            executor,
        }
    }

    /// Registry key of this model
    pub fn key(&self) -> &str {
        &self.compiled.key
    }

    pub fn pk(&self) -> Option<&str> {
        self.compiled.attributes.pk()
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.compiled.attributes
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.compiled.definition
    }

    pub fn context(&self) -> &Arc<RequestContext> {
        &self.ctx
    }

    pub(crate) fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub(crate) fn hooks(&self) -> &HookPipeline {
        &self.compiled.hooks
    }

    /// Escaped, tenant-qualified table reference.
    pub fn table_name(&self) -> ModelResult<String> {
        resolve_table_name(
            self.executor.connection(),
            &self.compiled.definition.table_name,
            self.compiled.definition.site_only,
            self.ctx.tenant(),
        )
    }

    /// How `field` connects to another model; `None` for plain columns.
    pub fn connection_info(&self, field: &str) -> ModelResult<Option<&ConnectionInfo>> {
        if !self.attributes().contains(field) {
            return Err(ModelError::definition(self.key(), field, "unknown attribute"));
        }
        Ok(self.ctx.registry().connection(self.key(), field))
    }

    /// Names of all relation fields
    pub fn relation_fields(&self) -> Vec<&str> {
        self.ctx
            .registry()
            .graph()
            .connections(self.key())
            .map(|(field, _)| field.as_str())
            .collect()
    }

    pub(crate) fn require_pk(&self) -> ModelResult<&str> {
        self.pk().ok_or_else(|| {
            ModelError::definition(self.key(), "primaryKey", "model has no primary key")
        })
    }

    /// The model on the other end of a connection, bound to this request
    pub fn other_model(&self, info: &ConnectionInfo) -> ModelResult<Model> {
        self.ctx.model(&info.other_model)
    }

    /// The join model of a `many:many` connection, bound to this request
    pub fn join_model(&self, info: &ConnectionInfo) -> ModelResult<Model> {
        if info.connection_type != ConnectionType::ManyToMany {
            return Err(ModelError::definition(
                self.key(),
                &info.attribute.attr_name,
                format!("no join model for a {} connection", info.connection_type),
            ));
        }
        self.ctx.model(&join_model_key(self.key(), info))
    }
}
