//! Built-in tool implementations for TreeShell.
//!
//! Tools are reached from the tree through the `tool_call` handler.

pub mod shell;

use std::time::Duration;
use treeshell_config::ShellConfig;
use treeshell_core::tool::ToolRegistry;

pub use shell::BashTool;

/// Create a tool registry with all built-in tools configured from `[shell]`.
pub fn default_registry(shell: &ShellConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(BashTool::new(
        shell.allowed_commands.clone(),
        Duration::from_secs(shell.timeout_secs),
    )));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_bash_tool() {
        let registry = default_registry(&ShellConfig::default());
        assert_eq!(registry.names(), vec!["bash_tool"]);
    }
}
