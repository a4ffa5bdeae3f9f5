pub mod config_cmd;
pub mod repl;
pub mod run;
pub mod tree;

use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use treeshell_config::{AppConfig, ConfigError};
use treeshell_core::{Engine, Response, TreeShell};
use treeshell_handlers::CompletionSettings;

/// Load from `path` when given, otherwise from `~/.treeshell/config.toml`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}

/// Wire the catalog, tools, provider and handlers into a fresh shell.
pub fn build_shell(config: &AppConfig) -> Result<TreeShell, Box<dyn std::error::Error>> {
    let space = config.tree.build_space()?;
    let tools = Arc::new(treeshell_tools::default_registry(&config.shell));
    let provider = treeshell_providers::build_from_config(&config.provider);
    let handlers = treeshell_handlers::default_registry(
        tools,
        provider,
        CompletionSettings::from(&config.provider),
    );

    let engine = Engine::new(Arc::new(space), Arc::new(handlers)).with_options(config.engine);
    for node in engine.unbound_nodes() {
        warn!(
            address = %node.address,
            handler = node.handler_id.as_deref().unwrap_or_default(),
            "Node is bound to an unregistered handler"
        );
    }

    Ok(TreeShell::new(engine))
}

/// Print a response as pretty JSON on stdout.
pub fn print_response(response: &Response) {
    let json = response.to_json();
    println!(
        "{}",
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
    );
}
