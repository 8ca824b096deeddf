//! BoxToolExecutor -- object-safe, cloneable wrapper for ToolExecutor.
//!
//! 1. Define an object-safe `ToolExecutorDyn` trait with boxed futures
//! 2. Blanket-impl `ToolExecutorDyn` for all `T: ToolExecutor`
//! 3. `BoxToolExecutor` wraps `Arc<dyn ToolExecutorDyn>` and delegates
//!
//! The `Arc` lets the scheduler hand a handle to every spawned step task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::executor::{ToolError, ToolExecutor};

/// Object-safe version of [`ToolExecutor`] with boxed futures.
pub trait ToolExecutorDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        tool_id: &'a str,
        params: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;
}

/// Blanket implementation: any `ToolExecutor` automatically implements `ToolExecutorDyn`.
impl<T: ToolExecutor> ToolExecutorDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        tool_id: &'a str,
        params: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>> {
        Box::pin(self.execute(tool_id, params))
    }
}

/// Type-erased tool executor shared across step tasks.
#[derive(Clone)]
pub struct BoxToolExecutor {
    inner: Arc<dyn ToolExecutorDyn>,
}

impl BoxToolExecutor {
    /// Wrap a concrete `ToolExecutor`.
    pub fn new<T: ToolExecutor + 'static>(executor: T) -> Self {
        Self {
            inner: Arc::new(executor),
        }
    }

    /// Wrap an already shared executor (keeps the caller's handle usable).
    pub fn from_arc<T: ToolExecutor + 'static>(executor: Arc<T>) -> Self {
        Self { inner: executor }
    }

    /// Invoke a tool.
    pub async fn execute(&self, tool_id: &str, params: &Value) -> Result<Value, ToolError> {
        self.inner.execute_boxed(tool_id, params).await
    }
}

impl std::fmt::Debug for BoxToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxToolExecutor").finish_non_exhaustive()
    }
}
