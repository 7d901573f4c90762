//! Convenience adapters for writing hooks as closures.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HookError;
use crate::hooks::definitions::{HookAction, HookContext};
use crate::hooks::registry::HookHandler;

/// A hook backed by an async closure.
///
/// The closure receives an owned copy of the context, so it can be
/// moved into the returned future freely.
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnHook<F>
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookAction, HookError>> + Send + 'static,
{
    /// Wraps a closure.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Wraps a closure directly into a shareable handler.
    pub fn arc(name: impl Into<String>, f: F) -> Arc<dyn HookHandler> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> std::fmt::Debug for FnHook<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHook").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> HookHandler for FnHook<F>
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookAction, HookError>> + Send + 'static,
{
    async fn handle(&self, ctx: &HookContext) -> Result<HookAction, HookError> {
        (self.f)(ctx.clone()).await
    }
}
