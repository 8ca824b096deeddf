//! Scripted tool executor shared by the engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;

use crate::tool::{ToolError, ToolExecutor};

type Handler = Box<dyn Fn(&str, &Value) -> Result<Value, ToolError> + Send + Sync>;

/// Tool executor driven by a closure, counting calls and peak concurrency.
pub(crate) struct ScriptedTools {
    handler: Handler,
    delays: DashMap<String, Duration>,
    default_delay: std::sync::Mutex<Duration>,
    calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl ScriptedTools {
    pub(crate) fn new(
        handler: impl Fn(&str, &Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            delays: DashMap::new(),
            default_delay: std::sync::Mutex::new(Duration::ZERO),
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        })
    }

    /// Every tool returns its params.
    pub(crate) fn echo() -> Arc<Self> {
        Self::new(|_, params| Ok(params.clone()))
    }

    pub(crate) fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.default_delay.lock().unwrap() = delay;
        self
    }

    pub(crate) fn with_tool_delay(self: Arc<Self>, tool: &str, delay: Duration) -> Arc<Self> {
        self.delays.insert(tool.to_string(), delay);
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ToolExecutor for ScriptedTools {
    async fn execute(&self, tool_id: &str, params: &Value) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .get(tool_id)
            .map(|d| *d)
            .unwrap_or_else(|| *self.default_delay.lock().unwrap());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = (self.handler)(tool_id, params);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
