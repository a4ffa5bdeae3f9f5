//! Handler trait — the boundary to single-action executors.
//!
//! Every action node names a handler by id. The engine hands the handler the
//! substituted arguments plus the writable parts of the session; it does not
//! know whether the handler shells out, calls a model, or only touches
//! session bookkeeping.

use crate::address::Address;
use crate::error::ExecutionError;
use crate::session::{AgentRegistry, SessionId, StepResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// What a handler may see and touch while it runs.
pub struct HandlerContext<'a> {
    pub session_id: &'a SessionId,

    /// The node being executed
    pub address: &'a Address,

    /// Results recorded before this step
    pub results: &'a [StepResult],

    pub context: &'a mut Map<String, Value>,

    pub agents: &'a mut AgentRegistry,
}

/// The core Handler trait.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The id nodes use to bind to this handler (e.g. "tool_call").
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// Run once with fully substituted arguments.
    async fn invoke(
        &self,
        args: Value,
        cx: &mut HandlerContext<'_>,
    ) -> Result<Value, ExecutionError>;
}

/// Handlers selectable by id.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Replaces any existing handler with the same id.
    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler.id().to_string(), handler);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    /// Dispatch to the handler registered under `id`.
    pub async fn invoke(
        &self,
        id: &str,
        args: Value,
        cx: &mut HandlerContext<'_>,
    ) -> Result<Value, ExecutionError> {
        let handler = self
            .handlers
            .get(id)
            .ok_or_else(|| ExecutionError::UnknownHandler(id.to_string()))?;
        handler.invoke(args, cx).await
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.ids())
            .finish()
    }
}
