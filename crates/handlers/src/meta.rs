//! Session-variable and session-introspection handlers.

use crate::args::required_str;
use async_trait::async_trait;
use serde_json::{Value, json};
use treeshell_core::{ExecutionError, Handler, HandlerContext};

fn not_found(handler: &str, name: &str) -> ExecutionError {
    ExecutionError::Failed {
        handler: handler.into(),
        reason: format!("variable '{name}' not found"),
    }
}

/// Which meta operation a [`MetaHandler`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaOp {
    SaveVar,
    GetVar,
    AppendToVar,
    DeleteVar,
    ListVars,
    SessionStats,
    ExportSession,
}

impl MetaOp {
    pub const ALL: [MetaOp; 7] = [
        MetaOp::SaveVar,
        MetaOp::GetVar,
        MetaOp::AppendToVar,
        MetaOp::DeleteVar,
        MetaOp::ListVars,
        MetaOp::SessionStats,
        MetaOp::ExportSession,
    ];

    pub fn id(self) -> &'static str {
        match self {
            MetaOp::SaveVar => "save_var",
            MetaOp::GetVar => "get_var",
            MetaOp::AppendToVar => "append_to_var",
            MetaOp::DeleteVar => "delete_var",
            MetaOp::ListVars => "list_vars",
            MetaOp::SessionStats => "session_stats",
            MetaOp::ExportSession => "export_session",
        }
    }
}

/// Operations over the session's context map and result log.
pub struct MetaHandler {
    op: MetaOp,
}

impl MetaHandler {
    pub fn new(op: MetaOp) -> Self {
        Self { op }
    }
}

#[async_trait]
impl Handler for MetaHandler {
    fn id(&self) -> &str {
        self.op.id()
    }

    fn description(&self) -> &str {
        match self.op {
            MetaOp::SaveVar => "Store a value under a name",
            MetaOp::GetVar => "Read a stored value",
            MetaOp::AppendToVar => "Push onto a list variable or extend a string variable",
            MetaOp::DeleteVar => "Remove a stored value",
            MetaOp::ListVars => "All stored values",
            MetaOp::SessionStats => "Counts of results, variables and agents",
            MetaOp::ExportSession => "The whole session as one JSON document",
        }
    }

    async fn invoke(
        &self,
        args: Value,
        cx: &mut HandlerContext<'_>,
    ) -> Result<Value, ExecutionError> {
        let id = self.op.id();
        match self.op {
            MetaOp::SaveVar => {
                let name = required_str(&args, &["name"])?;
                let value = args.get("value").cloned().unwrap_or(Value::Null);
                cx.context.insert(name.to_string(), value.clone());
                Ok(json!({ "saved": true, "variable": name, "value": value }))
            }
            MetaOp::GetVar => {
                let name = required_str(&args, &["name"])?;
                cx.context
                    .get(name)
                    .cloned()
                    .ok_or_else(|| not_found(id, name))
            }
            MetaOp::AppendToVar => {
                let name = required_str(&args, &["name"])?;
                let value = args.get("value").cloned().unwrap_or(Value::Null);
                let current = cx.context.get_mut(name).ok_or_else(|| not_found(id, name))?;
                match &mut *current {
                    Value::Array(items) => items.push(value),
                    Value::String(text) => match value {
                        Value::String(more) => text.push_str(&more),
                        other => text.push_str(&other.to_string()),
                    },
                    other => {
                        return Err(ExecutionError::Failed {
                            handler: id.into(),
                            reason: format!("cannot append to a {} variable", type_name(other)),
                        });
                    }
                }
                Ok(json!({ "appended": true, "variable": name, "new_value": current }))
            }
            MetaOp::DeleteVar => {
                let name = required_str(&args, &["name"])?;
                cx.context.remove(name).ok_or_else(|| not_found(id, name))?;
                Ok(json!({ "deleted": true, "variable": name }))
            }
            MetaOp::ListVars => Ok(json!({
                "variables": cx.context,
                "count": cx.context.len(),
            })),
            MetaOp::SessionStats => {
                let failed = cx.results.iter().filter(|r| !r.success).count();
                Ok(json!({
                    "session_id": cx.session_id,
                    "results": cx.results.len(),
                    "failed_results": failed,
                    "variables": cx.context.len(),
                    "agents": cx.agents.len(),
                }))
            }
            MetaOp::ExportSession => Ok(json!({
                "session_id": cx.session_id,
                "exported_at": chrono::Utc::now(),
                "results": cx.results,
                "variables": cx.context,
                "agents": cx.agents,
            })),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
