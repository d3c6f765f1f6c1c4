//! OpenAI-compatible client
//!
//! Talks to servers exposing `/chat/completions`, such as llama-server.
//! When `backend.tokenize_context` is set the recorded context is also
//! tokenized through the llama.cpp `/tokenize` endpoint.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Config, Message, ParleyError, Result, Role};
use crate::llm::context::{ContextSnapshot, SnapshotCell};
use crate::llm::http::{body_error, build_client, check_status, preview, send_error};
use crate::llm::sse::{SseBuffer, SseEvent};
use crate::llm::traits::{
    ContextInspect, GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage,
};

/// Client for OpenAI-compatible chat servers
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    tokenize_url: Option<url::Url>,
    context: SnapshotCell,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        // Plain chat servers have no tool role without tool schemas
        match msg.role {
            Role::Tool => WireMessage {
                role: Role::User.as_str(),
                content: format!(
                    "Tool '{}' returned: {}",
                    msg.tool_name.as_deref().unwrap_or("tool"),
                    msg.content
                ),
            },
            role => WireMessage {
                role: role.as_str(),
                content: msg.content.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    delta: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    content: &'a str,
    with_pieces: bool,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    tokens: Vec<TokenEntry>,
}

/// `/tokenize` answers with bare ids, or `{id, piece}` objects when pieces
/// were requested. Pieces that are not valid UTF-8 come back as byte arrays.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenEntry {
    Id(u32),
    Piece { id: u32, piece: Value },
}

impl TokenEntry {
    fn split(self) -> (u32, Option<String>) {
        match self {
            TokenEntry::Id(id) => (id, None),
            TokenEntry::Piece { id, piece } => (id, Some(piece_text(&piece))),
        }
    }
}

fn piece_text(piece: &Value) -> String {
    match piece {
        Value::String(s) => s.clone(),
        Value::Array(bytes) => {
            let bytes: Vec<u8> = bytes
                .iter()
                .filter_map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            String::from_utf8_lossy(&bytes).into_owned()
        }
        other => other.to_string(),
    }
}

impl OpenAiCompatClient {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.base_url();
        let tokenize_url = if config.backend.tokenize_context {
            let parsed = url::Url::parse(&base_url)
                .map_err(|e| ParleyError::config(format!("Invalid base_url: {}", e)))?;
            // llama-server serves /tokenize at the root, outside /v1
            Some(
                parsed
                    .join("/tokenize")
                    .map_err(|e| ParleyError::config(format!("Invalid base_url: {}", e)))?,
            )
        } else {
            None
        };

        Ok(Self {
            client: build_client(config)?,
            base_url,
            tokenize_url,
            context: SnapshotCell::default(),
        })
    }

    /// Base URL the client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request<'a>(
        model: &'a str,
        messages: &[Message],
        options: Option<GenerateOptions>,
        stream: bool,
    ) -> ChatRequest<'a> {
        let options = options.unwrap_or_default();
        ChatRequest {
            model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop,
            stream,
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        tracing::debug!(
            "Chat completion request: {}",
            preview(&serde_json::to_string(request)?)
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;

        check_status(response, request.model).await
    }

    /// Tokenize text through the server, returning ids and pieces
    pub async fn tokenize(&self, text: &str) -> Result<(Vec<u32>, Vec<String>)> {
        let Some(url) = &self.tokenize_url else {
            return Ok((Vec::new(), Vec::new()));
        };

        let response = self
            .client
            .post(url.clone())
            .json(&TokenizeRequest {
                content: text,
                with_pieces: true,
            })
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;

        if !response.status().is_success() {
            return Err(ParleyError::backend(format!(
                "Tokenize failed ({})",
                response.status()
            )));
        }

        let parsed: TokenizeResponse = response.json().await?;
        let mut ids = Vec::with_capacity(parsed.tokens.len());
        let mut pieces = Vec::new();
        for entry in parsed.tokens {
            let (id, piece) = entry.split();
            ids.push(id);
            if let Some(piece) = piece {
                pieces.push(piece);
            }
        }
        Ok((ids, pieces))
    }

    async fn record(&self, messages: &[Message], response: &LLMResponse) {
        let reported = response
            .usage
            .as_ref()
            .map(|u| u.total_tokens as usize)
            .unwrap_or_default();
        let mut snapshot = ContextSnapshot::from_exchange(messages, &response.content, reported);

        if self.tokenize_url.is_some() {
            match self.tokenize(&snapshot.text).await {
                Ok((tokens, pieces)) => {
                    snapshot.tokens = tokens;
                    snapshot.pieces = pieces;
                }
                Err(e) => tracing::warn!("Could not tokenize context: {}", e),
            }
        }

        self.context.set(snapshot);
    }
}

#[async_trait]
impl LLMProvider for OpenAiCompatClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = Self::build_request(model, messages, options, false);
        let response = self.send(&request).await?;

        let response_text = response.text().await?;
        tracing::debug!("Chat completion response: {}", preview(&response_text));

        let parsed: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| ParleyError::parse(format!("Failed to parse response: {}", e)))?;
        if let Some(error) = &parsed.error {
            return Err(body_error(error));
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| ParleyError::parse("Response has no choices"))?;

        let result = LLMResponse {
            content,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
            model: if parsed.model.is_empty() {
                model.to_string()
            } else {
                parsed.model
            },
        };
        self.record(messages, &result).await;
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
        let mut buffer = SseBuffer::new();
        let mut done = false;

        // Ok(true) once the server signals the end of the stream
        let mut handle = |event: SseEvent| -> Result<bool> {
            let data = match event {
                SseEvent::Done => return Ok(true),
                SseEvent::Data(data) => data,
            };
            match serde_json::from_str::<ChatResponse>(&data) {
                Ok(chunk) => {
                    if let Some(error) = &chunk.error {
                        return Err(body_error(error));
                    }
                    if !chunk.model.is_empty() {
                        final_model = chunk.model;
                    }
                    if let Some(u) = chunk.usage {
                        token_usage = Some(TokenUsage::new(u.prompt_tokens, u.completion_tokens));
                    }
                    let text = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta)
                        .and_then(|d| d.content);
                    if let Some(text) = text.filter(|t| !t.is_empty()) {
                        on_token(&text);
                        full_content.push_str(&text);
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed stream chunk: {}", e),
            }
            Ok(false)
        };

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ParleyError::backend(format!("Stream error: {}", e)))?;
            for event in buffer.push(&chunk) {
                if handle(event)? {
                    done = true;
                    break;
                }
            }
            if done {
                break;
            }
        }
        if !done {
            if let Some(event) = buffer.finish() {
                handle(event)?;
            }
        }

        let result = LLMResponse {
            content: full_content,
            usage: token_usage,
            model: final_model,
        };
        self.record(messages, &result).await;
        Ok(result)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .send()
            .await
            .map_err(|e| send_error(&self.base_url, e))?;

        if !response.status().is_success() {
            return Err(ParleyError::backend("Failed to list models"));
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    fn inspector(&self) -> Option<&dyn ContextInspect> {
        Some(&self.context)
    }

    fn name(&self) -> &str {
        "openai_compat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BackendKind;

    fn config(tokenize: bool) -> Config {
        let mut config = Config::default();
        config.backend.kind = BackendKind::OpenAiCompat;
        config.backend.base_url = "http://127.0.0.1:8123/v1/".to_string();
        config.backend.tokenize_context = tokenize;
        config
    }

    #[test]
    fn test_tokenize_url_at_root() {
        let client = OpenAiCompatClient::from_config(&config(true)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8123/v1");
        assert_eq!(
            client.tokenize_url.as_ref().map(|u| u.as_str()),
            Some("http://127.0.0.1:8123/tokenize")
        );

        let client = OpenAiCompatClient::from_config(&config(false)).unwrap();
        assert!(client.tokenize_url.is_none());
    }

    #[test]
    fn test_tool_messages_become_user_turns() {
        let wire = WireMessage::from(&Message::tool("getCurrentTime", "03:15 PM"));
        assert_eq!(wire.role, "user");
        assert_eq!(wire.content, "Tool 'getCurrentTime' returned: 03:15 PM");
    }

    #[test]
    fn test_token_entries() {
        let parsed: TokenizeResponse = serde_json::from_str(
            r#"{"tokens": [{"id": 9906, "piece": "Hello"}, {"id": 30, "piece": [226, 130]}]}"#,
        )
        .unwrap();
        let split: Vec<_> = parsed.tokens.into_iter().map(TokenEntry::split).collect();
        assert_eq!(split[0], (9906, Some("Hello".to_string())));
        assert_eq!(split[1].0, 30);

        let bare: TokenizeResponse = serde_json::from_str(r#"{"tokens": [1, 2]}"#).unwrap();
        assert!(matches!(bare.tokens[0], TokenEntry::Id(1)));
    }
}
