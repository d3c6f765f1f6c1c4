//! LLM Provider trait for abstracting different backends
//!
//! Enables swapping between Ollama's native API and OpenAI-compatible
//! servers such as llama-server.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::{Message, Result};

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Text content of the top choice
    pub content: String,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Usage from prompt and completion counts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Options for LLM generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
    /// Whether to stream the response
    pub stream: bool,
}

/// Callback invoked with each streamed token
pub type StreamCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response from messages
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    /// Generate a streaming response with a callback for each token.
    /// The returned response carries the full concatenated text.
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
        on_token: StreamCallback,
    ) -> Result<LLMResponse>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Check if a model is available. Tags are matched by prefix, so
    /// `mistral` matches `mistral:7b-instruct`.
    async fn is_model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }

    /// Context introspection, when the backend records it
    fn inspector(&self) -> Option<&dyn ContextInspect> {
        None
    }

    /// Get the provider name
    fn name(&self) -> &str;
}

/// Read-only view of a backend's most recent context window
pub trait ContextInspect: Send + Sync {
    /// Token ids of the context, empty when the backend cannot tokenize
    fn context_tokens(&self) -> Vec<u32>;

    /// Number of tokens in the context
    fn token_count(&self) -> usize;

    /// Rendered context text
    fn context_text(&self) -> String;

    /// Text of each token, parallel to `context_tokens`
    fn token_pieces(&self) -> Vec<String>;
}
