//! Configuration loading, validation, and management for TreeShell.
//!
//! Loads configuration from `~/.treeshell/config.toml` with environment
//! variable overrides. Validates all settings, including the node catalog,
//! at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use treeshell_core::{Address, AddressError, AddressSpace, ArgType, EngineOptions, Node};

/// The root configuration structure.
///
/// Maps directly to `~/.treeshell/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine behaviour
    #[serde(default)]
    pub engine: EngineOptions,

    /// Shell tool settings
    #[serde(default)]
    pub shell: ShellConfig,

    /// Chat-completion provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// The node catalog
    #[serde(default)]
    pub tree: TreeConfig,
}

/// Settings for `bash_tool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// First words a command may start with. Empty allows everything.
    #[serde(default)]
    pub allowed_commands: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            allowed_commands: vec![],
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// The node catalog. An empty `nodes` list means the built-in catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_app_id")]
    pub app_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeConfig>,
}

fn default_app_id() -> String {
    "treeshell".into()
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            nodes: vec![],
        }
    }
}

/// One `[[tree.nodes]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub address: String,

    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Handler id. Omit for a menu node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, ArgType>,
}

impl NodeConfig {
    fn to_node(&self) -> Result<Node, ConfigError> {
        let address: Address = self
            .address
            .parse()
            .map_err(|e: AddressError| ConfigError::Catalog(e.to_string()))?;
        let mut node = match &self.handler {
            Some(handler) => Node::action(address, &self.label, handler),
            None => Node::menu(address, &self.label),
        };
        node.description = self.description.clone();
        node.arg_schema = self.args.clone();
        Ok(node)
    }
}

impl TreeConfig {
    /// The configured catalog, or the built-in one when none is given.
    pub fn effective_nodes(&self) -> Vec<NodeConfig> {
        if self.nodes.is_empty() {
            default_catalog()
        } else {
            self.nodes.clone()
        }
    }

    /// Build the address space. Parents must be declared before children.
    pub fn build_space(&self) -> Result<AddressSpace, ConfigError> {
        let mut builder = AddressSpace::builder();
        for entry in self.effective_nodes() {
            builder
                .insert(entry.to_node()?)
                .map_err(|e| ConfigError::Catalog(e.to_string()))?;
        }
        Ok(builder.build())
    }
}

fn entry(
    address: &str,
    label: &str,
    description: &str,
    handler: Option<&str>,
    args: &[(&str, ArgType)],
) -> NodeConfig {
    NodeConfig {
        address: address.into(),
        label: label.into(),
        description: Some(description.into()),
        handler: handler.map(str::to_string),
        args: args.iter().map(|(k, t)| (k.to_string(), *t)).collect(),
    }
}

/// The catalog a fresh install ships with.
pub fn default_catalog() -> Vec<NodeConfig> {
    use ArgType::*;
    vec![
        entry("0", "TreeShell", "Main menu", None, &[]),
        entry("0.1", "Conversation", "Chat with named agents", None, &[]),
        entry(
            "0.1.1",
            "Start chat",
            "Send a message, optionally to a named agent",
            Some("model_completion"),
            &[("message", String), ("title", String), ("system_prompt", String)],
        ),
        entry(
            "0.1.2",
            "Continue chat",
            "Send a follow-up to an existing agent",
            Some("model_completion"),
            &[("agent", String), ("message", String)],
        ),
        entry("0.1.3", "List agents", "Agents alive in this session", Some("list_agents"), &[]),
        entry(
            "0.1.4",
            "Evict agent",
            "Forget an agent and its history",
            Some("evict_agent"),
            &[("name", String)],
        ),
        entry("0.2", "Session variables", "Named values kept for this session", None, &[]),
        entry(
            "0.2.1",
            "Save variable",
            "Store a value under a name",
            Some("save_var"),
            &[("name", String), ("value", Any)],
        ),
        entry("0.2.2", "Get variable", "Read a stored value", Some("get_var"), &[("name", String)]),
        entry(
            "0.2.3",
            "Append to variable",
            "Push onto a list or extend a string",
            Some("append_to_var"),
            &[("name", String), ("value", Any)],
        ),
        entry("0.2.4", "Delete variable", "Remove a stored value", Some("delete_var"), &[("name", String)]),
        entry("0.2.5", "List variables", "Names of stored values", Some("list_vars"), &[]),
        entry("0.2.6", "Session stats", "Counts for this session", Some("session_stats"), &[]),
        entry(
            "0.2.7",
            "Export session",
            "Results, variables and agents as JSON",
            Some("export_session"),
            &[],
        ),
        entry("0.5", "Tools", "Run registered tools", None, &[]),
        entry(
            "0.5.1",
            "Run tool",
            "Execute a tool by name",
            Some("tool_call"),
            &[("tool_name", String), ("parameters", Object)],
        ),
        entry("0.5.2", "List tools", "Registered tools and their parameters", Some("list_tools"), &[]),
    ]
}

impl AppConfig {
    /// Load configuration from the default path (~/.treeshell/config.toml).
    ///
    /// Environment overrides are applied afterwards:
    /// - `TREESHELL_API_KEY`, then `OPENAI_API_KEY`, when no key is configured
    /// - `TREESHELL_MODEL`
    /// - `TREESHELL_API_URL`
    /// - `TREESHELL_CONTINUE_ON_ERROR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("TREESHELL_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(model) = lookup("TREESHELL_MODEL") {
            self.provider.model = model;
        }

        if let Some(url) = lookup("TREESHELL_API_URL") {
            self.provider.api_url = url;
        }

        if let Some(flag) = lookup("TREESHELL_CONTINUE_ON_ERROR") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.engine.continue_on_error = true,
                "0" | "false" | "no" | "off" => self.engine.continue_on_error = false,
                other => tracing::warn!(value = other, "Ignoring TREESHELL_CONTINUE_ON_ERROR"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".treeshell")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.shell.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "shell.timeout_secs must be > 0".into(),
            ));
        }

        self.tree.build_space()?;
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// The effective configuration as TOML with the API key masked.
    pub fn redacted_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.provider.api_key.is_some() {
            shown.provider.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid node catalog: {0}")]
    Catalog(String),
}
