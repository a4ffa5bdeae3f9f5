//! `treeshell config` — show configuration.

use std::path::Path;
use treeshell_config::AppConfig;

pub fn run(config: &AppConfig, path: Option<&Path>, defaults: bool) {
    if defaults {
        print!("{}", AppConfig::default_toml());
        return;
    }

    let default_path = AppConfig::config_dir().join("config.toml");
    println!("# {}", path.unwrap_or(&default_path).display());
    if !config.has_api_key() {
        println!("# No API key set (TREESHELL_API_KEY or OPENAI_API_KEY); model completion is disabled");
    }
    print!("{}", config.redacted_toml());
}
