//! Ollama client implementation
//!
//! Async HTTP client for the native Ollama API with streaming support.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::{Config, Message, ParleyError, Result};
use crate::llm::context::{ContextSnapshot, SnapshotCell};
use crate::llm::http::{body_error, build_client, check_status, preview, send_error};
use crate::llm::traits::{
    ContextInspect, GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage,
};

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    context: SnapshotCell,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

/// Ollama chat response; the same shape arrives per line when streaming
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

fn usage(prompt: Option<u32>, completion: Option<u32>) -> Option<TokenUsage> {
    match (prompt, completion) {
        (Some(prompt), Some(completion)) => Some(TokenUsage::new(prompt, completion)),
        _ => None,
    }
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url(),
            context: SnapshotCell::default(),
        })
    }

    /// Base URL the client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request<'a>(
        model: &'a str,
        messages: &'a [Message],
        options: Option<GenerateOptions>,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            options: options.map(|opts| OllamaOptions {
                temperature: opts.temperature,
                num_predict: opts.max_tokens,
                stop: opts.stop,
            }),
            stream,
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        tracing::debug!(
            "Ollama request: {}",
            preview(&serde_json::to_string(request)?)
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;

        check_status(response, request.model).await
    }

    fn record(&self, messages: &[Message], response: &LLMResponse) {
        let reported = response
            .usage
            .as_ref()
            .map(|u| u.total_tokens as usize)
            .unwrap_or_default();
        self.context.set(ContextSnapshot::from_exchange(
            messages,
            &response.content,
            reported,
        ));
    }
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = Self::build_request(model, messages, options, false);
        let response = self.send(&request).await?;

        let response_text = response.text().await?;
        tracing::debug!("Ollama response: {}", preview(&response_text));

        let chat: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| ParleyError::parse(format!("Failed to parse response: {}", e)))?;
        if let Some(error) = &chat.error {
            return Err(body_error(error));
        }

        let result = LLMResponse {
            content: chat.message.map(|m| m.content).unwrap_or_default(),
            usage: usage(chat.prompt_eval_count, chat.eval_count),
            model: chat.model,
        };
        self.record(messages, &result);
        Ok(result)
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
        on_token: StreamCallback,
    ) -> Result<LLMResponse> {
        let request = Self::build_request(model, messages, options, true);
        let response = self.send(&request).await?;

        let mut full_content = String::new();
        let mut final_model = model.to_string();
        let mut token_usage = None;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        let mut handle_line = |line: &[u8]| -> Result<()> {
            let line = String::from_utf8_lossy(line);
            let line = line.trim();
            if line.is_empty() {
                return Ok(());
            }
            match serde_json::from_str::<ChatResponse>(line) {
                Ok(chunk) => {
                    if let Some(error) = &chunk.error {
                        return Err(body_error(error));
                    }
                    if !chunk.model.is_empty() {
                        final_model = chunk.model;
                    }
                    if let Some(msg) = chunk.message {
                        if !msg.content.is_empty() {
                            on_token(&msg.content);
                            full_content.push_str(&msg.content);
                        }
                    }
                    if chunk.done {
                        token_usage = usage(chunk.prompt_eval_count, chunk.eval_count);
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed stream line: {}", e),
            }
            Ok(())
        };

        // Ollama streams one JSON object per line
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ParleyError::backend(format!("Stream error: {}", e)))?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                handle_line(&line)?;
            }
        }
        if !buffer.is_empty() {
            handle_line(&buffer)?;
        }

        let result = LLMResponse {
            content: full_content,
            usage: token_usage,
            model: final_model,
        };
        self.record(messages, &result);
        Ok(result)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;

        if !response.status().is_success() {
            return Err(ParleyError::backend("Failed to list models"));
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models.models.into_iter().map(|m| m.name).collect())
    }

    fn inspector(&self) -> Option<&dyn ContextInspect> {
        Some(&self.context)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
