//! Tool-call adapter: routes `{tool_name, parameters}` to the tool registry.

use crate::args::required_str;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};
use treeshell_core::{ExecutionError, Handler, HandlerContext, ToolRegistry};

pub struct ToolCallHandler {
    tools: Arc<ToolRegistry>,
}

impl ToolCallHandler {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Handler for ToolCallHandler {
    fn id(&self) -> &str {
        "tool_call"
    }

    fn description(&self) -> &str {
        "Run a registered tool with the given parameters"
    }

    async fn invoke(
        &self,
        args: Value,
        cx: &mut HandlerContext<'_>,
    ) -> Result<Value, ExecutionError> {
        let tool_name = required_str(&args, &["tool_name"])?;
        let parameters = match args.get("parameters") {
            None | Some(Value::Null) => json!({}),
            Some(Value::Object(map)) => Value::Object(map.clone()),
            Some(_) => {
                return Err(ExecutionError::InvalidArguments(
                    "'parameters' must be an object".into(),
                ));
            }
        };

        debug!(session = %cx.session_id, address = %cx.address, tool = tool_name, "Calling tool");
        let result = self.tools.execute(tool_name, parameters).await?;

        if !result.success {
            warn!(tool = tool_name, "Tool reported failure");
            return Err(ExecutionError::Failed {
                handler: tool_name.to_string(),
                reason: result.output,
            });
        }

        Ok(result.data.unwrap_or(Value::String(result.output)))
    }
}

/// Lists the registered tools with their parameter schemas.
pub struct ListToolsHandler {
    tools: Arc<ToolRegistry>,
}

impl ListToolsHandler {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Handler for ListToolsHandler {
    fn id(&self) -> &str {
        "list_tools"
    }

    fn description(&self) -> &str {
        "List registered tools"
    }

    async fn invoke(
        &self,
        _args: Value,
        _cx: &mut HandlerContext<'_>,
    ) -> Result<Value, ExecutionError> {
        let tools = self.tools.definitions();
        Ok(json!({ "count": tools.len(), "tools": tools }))
    }
}
