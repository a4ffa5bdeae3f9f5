//! Chat-completion provider implementations for TreeShell.
//!
//! All providers implement the `treeshell_core::Provider` trait.

pub mod openai_compat;

use std::sync::Arc;
use treeshell_config::ProviderConfig;
use treeshell_core::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the configured provider. `None` when no API key is available.
pub fn build_from_config(config: &ProviderConfig) -> Option<Arc<dyn Provider>> {
    let Some(api_key) = config.api_key.as_deref() else {
        tracing::info!(provider = %config.name, "No API key configured; model completion disabled");
        return None;
    };
    Some(Arc::new(OpenAiCompatProvider::new(
        config.name.clone(),
        config.api_url.clone(),
        api_key,
    )))
}
