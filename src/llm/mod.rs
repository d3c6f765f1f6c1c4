//! LLM module - model backend integrations
//!
//! Ollama's native API and OpenAI-compatible servers sit behind the
//! `LLMProvider` trait; `create_provider` picks one from configuration.

pub mod context;
pub mod http;
pub mod ollama;
pub mod openai;
pub mod sse;
pub mod traits;

use std::sync::Arc;

use crate::core::{BackendKind, Config, Result};

pub use context::{render_chatml, ContextSnapshot, SnapshotCell};
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatClient;
pub use traits::{
    ContextInspect, GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage,
};

/// Build the backend client named by the configuration
pub fn create_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    config.validate()?;
    tracing::debug!(
        "Using {} backend at {}",
        config.backend.kind,
        config.base_url()
    );

    let provider: Arc<dyn LLMProvider> = match config.backend.kind {
        BackendKind::Ollama => Arc::new(OllamaClient::from_config(config)?),
        BackendKind::OpenAiCompat => Arc::new(OpenAiCompatClient::from_config(config)?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_by_kind() {
        let mut config = Config::default();
        assert_eq!(create_provider(&config).unwrap().name(), "ollama");

        config.backend.kind = BackendKind::OpenAiCompat;
        assert_eq!(create_provider(&config).unwrap().name(), "openai_compat");

        config.backend.base_url = "nonsense".to_string();
        assert!(create_provider(&config).is_err());
    }
}
