//! `bash_tool` — execute shell commands.
//!
//! Supports a first-word command allowlist and a per-call timeout. With an
//! allowlist set, commands containing shell control characters are refused
//! so the first word is the only program `sh` can start.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use treeshell_core::error::ToolError;
use treeshell_core::tool::{Tool, ToolResult};

const TOOL_NAME: &str = "bash_tool";

/// Characters that let `sh -c` chain, substitute, or redirect.
const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '$', '`', '<', '>', '(', ')', '\n', '\r'];

/// Execute shell commands with safety constraints.
pub struct BashTool {
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    timeout: Duration,
}

impl BashTool {
    pub fn new(allowed_commands: Vec<String>, timeout: Duration) -> Self {
        Self {
            allowed_commands,
            timeout,
        }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }

        if command.contains(SHELL_METACHARACTERS) {
            return false;
        }

        let base_cmd = command.split_whitespace().next().unwrap_or("");
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Non-zero exit status is reported as failure."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: TOOL_NAME.into(),
                reason: if command.contains(SHELL_METACHARACTERS) {
                    "Shell control characters are not allowed with an allowlist".into()
                } else {
                    format!(
                        "Command '{}' not in allowlist",
                        command.split_whitespace().next().unwrap_or("")
                    )
                },
            });
        }

        debug!(command = %command, timeout_secs = self.timeout.as_secs(), "Executing shell command");

        let child = Command::new("sh")
            .args(["-c", command])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: TOOL_NAME.into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: TOOL_NAME.into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let success = output.status.success();

        let result_text = if success {
            if stderr.trim().is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            format!("[exit code: {code}]\n{stdout}\n{stderr}")
        };

        Ok(ToolResult {
            success,
            output: result_text.trim().to_string(),
            data: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(allowed: &[&str]) -> BashTool {
        BashTool::new(
            allowed.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn allowlist_check() {
        let tool = tool(&["ls", "cat", "echo"]);
        assert!(tool.is_command_allowed("ls -la"));
        assert!(tool.is_command_allowed("  echo hi"));
        assert!(!tool.is_command_allowed("rm -rf /"));
        assert!(!tool.is_command_allowed(""));
    }

    #[test]
    fn allowlist_rejects_chained_commands() {
        let tool = tool(&["echo"]);
        for command in [
            "echo hi; id -un",
            "echo hi && id",
            "echo hi | sh",
            "echo $(id)",
            "echo `id`",
            "echo hi\nid",
            "echo hi > /tmp/out",
        ] {
            assert!(!tool.is_command_allowed(command), "{command:?} slipped through");
        }
    }

    #[tokio::test]
    async fn chained_command_is_denied_before_running() {
        let result = tool(&["echo"])
            .execute(serde_json::json!({"command": "echo hi; id -un"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[test]
    fn empty_allowlist_allows_all() {
        assert!(tool(&[]).is_command_allowed("anything goes"));
    }

    #[tokio::test]
    async fn execute_echo() {
        let result = tool(&[])
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_unsuccessful() {
        let result = tool(&[])
            .execute(serde_json::json!({"command": "echo oops; exit 3"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.starts_with("[exit code: 3]"));
        assert!(result.output.contains("oops"));
    }

    #[tokio::test]
    async fn blocked_command() {
        let result = tool(&["ls"])
            .execute(serde_json::json!({"command": "rm -rf /"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn missing_command_argument() {
        let result = tool(&[]).execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let tool = BashTool::new(vec![], Duration::from_millis(100));
        let result = tool.execute(serde_json::json!({"command": "sleep 5"})).await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }
}
