//! Text generation for the bot.
//!
//! - `provider`: the `GenerationProvider` seam plus request/response shapes
//! - `gemini`: hosted Gemini REST implementation
//! - `invoker`: fixed safety/sampling wrapper that never fails

pub mod gemini;
pub mod invoker;
pub mod provider;

pub use gemini::GeminiProvider;
pub use invoker::GenerationInvoker;
pub use provider::*;

use std::sync::Arc;

use secrecy::SecretString;

/// Configuration for creating a generation provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    /// Override for the API host; `None` uses the public endpoint.
    pub base_url: Option<String>,
}

/// Create a generation provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Arc<dyn GenerationProvider> {
    let mut provider = GeminiProvider::new(config.api_key.clone(), config.model.clone());
    if let Some(base_url) = &config.base_url {
        provider = provider.with_base_url(base_url.clone());
    }
    tracing::info!("Using Gemini (model: {})", config.model);
    Arc::new(provider)
}
