//! Built-in node handlers for TreeShell.
//!
//! Every action node in the tree names one of these by id. Two adapters reach
//! outside the session (`tool_call` into the tool registry, `model_completion`
//! into a provider); the rest work on session state only.

mod args;
pub mod completion;
pub mod meta;
pub mod tool_call;

use std::sync::Arc;
use treeshell_core::{HandlerRegistry, Provider, ToolRegistry};

pub use completion::{CompletionHandler, CompletionSettings, EvictAgentHandler, ListAgentsHandler};
pub use meta::{MetaHandler, MetaOp};
pub use tool_call::{ListToolsHandler, ToolCallHandler};

/// Register every built-in handler.
pub fn default_registry(
    tools: Arc<ToolRegistry>,
    provider: Option<Arc<dyn Provider>>,
    settings: CompletionSettings,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(ToolCallHandler::new(tools.clone())));
    registry.register(Arc::new(ListToolsHandler::new(tools)));
    registry.register(Arc::new(CompletionHandler::new(provider, settings)));
    registry.register(Arc::new(ListAgentsHandler));
    registry.register(Arc::new(EvictAgentHandler));
    for op in MetaOp::ALL {
        registry.register(Arc::new(MetaHandler::new(op)));
    }
    registry
}

#[cfg(test)]
pub(crate) async fn invoke_with(
    handler: &dyn treeshell_core::Handler,
    args: serde_json::Value,
    state: &mut treeshell_core::SessionState,
) -> Result<serde_json::Value, treeshell_core::ExecutionError> {
    let id = treeshell_core::SessionId::new();
    let address = treeshell_core::Address::root();
    let (results, context, agents) = state.parts_mut();
    let mut cx = treeshell_core::HandlerContext {
        session_id: &id,
        address: &address,
        results,
        context,
        agents,
    };
    handler.invoke(args, &mut cx).await
}
