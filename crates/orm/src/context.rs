//! Request context - what one logical request brings to its models
//!
//! A context binds the shared [`ModelRegistry`] to a connection and a tenant.
//! Every [`Model`] built from it (including related and join models reached
//! through relationships) runs against that same connection and tenant.

use std::future::Future;
use std::sync::Arc;

use crate::backends::Connection;
use crate::error::ModelResult;
use crate::model::Model;
use crate::query::retry::{self, RetryPolicy};
use crate::query::table::{DbConfig, TenantContext};
use crate::registry::ModelRegistry;

pub struct RequestContext {
    registry: Arc<ModelRegistry>,
    connection: Arc<dyn Connection>,
    tenant: TenantContext,
    retry: RetryPolicy,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("tenant", &self.tenant)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    pub fn new(
        registry: Arc<ModelRegistry>,
        connection: Arc<dyn Connection>,
        tenant: TenantContext,
    ) -> Arc<Self> {
        Self::with_policy(registry, connection, tenant, RetryPolicy::default())
    }

    pub fn with_policy(
        registry: Arc<ModelRegistry>,
        connection: Arc<dyn Connection>,
        tenant: TenantContext,
        retry: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            connection,
            tenant,
            retry,
        })
    }

    /// Build the model registered under `key` for this request.
    pub fn model(self: &Arc<Self>, key: &str) -> ModelResult<Model> {
        let compiled = self.registry.compiled(key)?;
        Ok(Model::new(self.clone(), compiled))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn connection(&self) -> Arc<dyn Connection> {
        self.connection.clone()
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant.tenant_id.as_deref()
    }

    pub fn db_config(&self) -> Option<&DbConfig> {
        self.tenant.db_config.as_ref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Re-run `op` on transient database failures under this request's policy.
    pub async fn with_retry<F, Fut, R>(&self, op: F) -> ModelResult<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ModelResult<R>>,
    {
        retry::with_retry(&self.retry, op).await
    }
}
