//! Model lifecycle hooks
//!
//! Hooks run in registration order. The first failure stops the pipeline
//! and fails the surrounding CRUD operation; later hooks and any remaining
//! statements are skipped.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::Record;
use crate::error::ModelResult;

/// A hook over the values flowing through `create` and `update`.
///
/// `before_*` hooks see the caller's input and may rewrite it; `after_*`
/// hooks see each resulting row and may decorate it.
#[async_trait]
pub trait ModelHook: Send + Sync {
    async fn before_create(&self, _values: &mut Record) -> ModelResult<()> {
        Ok(())
    }

    async fn after_create(&self, _row: &mut Record) -> ModelResult<()> {
        Ok(())
    }

    async fn before_update(&self, _values: &mut Record) -> ModelResult<()> {
        Ok(())
    }

    async fn after_update(&self, _row: &mut Record) -> ModelResult<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn ModelHook>>,
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookPipeline")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl ModelHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn push(&mut self, hook: Arc<dyn ModelHook>) {
        self.hooks.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub async fn before_create(&self, values: &mut Record) -> ModelResult<()> {
        for hook in &self.hooks {
            hook.before_create(values).await?;
        }
        Ok(())
    }

    pub async fn after_create(&self, row: &mut Record) -> ModelResult<()> {
        for hook in &self.hooks {
            hook.after_create(row).await?;
        }
        Ok(())
    }

    pub async fn before_update(&self, values: &mut Record) -> ModelResult<()> {
        for hook in &self.hooks {
            hook.before_update(values).await?;
        }
        Ok(())
    }

    pub async fn after_update(&self, row: &mut Record) -> ModelResult<()> {
        for hook in &self.hooks {
            hook.after_update(row).await?;
        }
        Ok(())
    }
}
