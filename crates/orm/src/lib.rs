//! # tenant-orm: schema-driven data access for multi-tenant MySQL
//!
//! Models are declared as loose attribute maps (YAML or JSON). Building a
//! [`ModelRegistry`] normalizes them once, infers the type of every
//! relationship from both of its ends and synthesizes join models for
//! `many:many` connections.
//!
//! Each request then binds the registry to a [`Connection`] and a
//! [`TenantContext`] through a [`RequestContext`]. Tenant rows live in a
//! database named `"{database}-{tenant}"`; site-only tables stay in the
//! default database.
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tenant_orm::{CrudOperations, ModelRegistry, MySqlConnection, OrmConfig, RequestContext};
//!
//! # async fn run() -> tenant_orm::ModelResult<()> {
//! let config = OrmConfig::from_env()?;
//! let registry = Arc::new(ModelRegistry::from_config(&config)?);
//! let connection = Arc::new(MySqlConnection::connect(&config).await?);
//!
//! let ctx = RequestContext::with_policy(
//!     registry,
//!     connection,
//!     config.tenant_context("acme")?,
//!     config.retry.clone(),
//! );
//! let users = ctx.model("user")?;
//! let admins = users.find(Some(json!({"roles": ["admin"]}).as_object().cloned().unwrap_or_default())).await?;
//! # let _ = admins;
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod backends;
pub mod conditions;
pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod model;
pub mod query;
pub mod registry;
pub mod relationships;
pub mod security;

pub use attributes::{Attribute, AttributeDescriptor, AttributeKind, AttributeSet, Multiplicity, RawAttribute};
pub use backends::{Connection, MySqlConnection, QueryResult, Record};
pub use conditions::{build_condition, Condition, SqlFragment};
pub use config::{ConfigError, OrmConfig};
pub use context::RequestContext;
pub use definition::ModelDefinition;
pub use error::{DbError, DbErrorKind, ModelError, ModelResult};
pub use model::{CrudOperations, HookPipeline, Model, ModelHook};
pub use query::{with_retry, DbConfig, QueryExecutor, RetryPolicy, TenantContext};
pub use registry::{CompiledModel, ModelRegistry, ModelRegistryBuilder};
pub use relationships::{ConnectionInfo, ConnectionType, RelationshipGraph};
