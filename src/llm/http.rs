//! HTTP plumbing shared by the backend clients

use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

use crate::core::{Config, ParleyError, Result};

/// Build the HTTP client for a backend
pub fn build_client(config: &Config) -> Result<Client> {
    let mut builder = Client::builder();
    if config.backend.timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(config.backend.timeout_secs));
    }
    builder
        .build()
        .map_err(|e| ParleyError::backend(format!("Failed to create HTTP client: {}", e)))
}

/// Map a send failure, calling out unreachable servers
pub fn send_error(base_url: &str, e: reqwest::Error) -> ParleyError {
    if e.is_connect() {
        ParleyError::backend(format!(
            "Cannot connect to model backend at {}. Is it running?",
            base_url
        ))
    } else if e.is_timeout() {
        ParleyError::backend(format!("Request to {} timed out", base_url))
    } else {
        ParleyError::from(e)
    }
}

/// Turn a non-success status into an error
pub async fn check_status(response: Response, model: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();

    if status.as_u16() == 404 && error_text.contains("not found") {
        return Err(ParleyError::ModelNotFound(model.to_string()));
    }

    Err(ParleyError::backend(format!(
        "API error ({}): {}",
        status, error_text
    )))
}

/// Error reported inside a response body, e.g. a model crash mid-stream.
/// Ollama sends a bare string; OpenAI-style servers send `{"message": ..}`.
pub fn body_error(error: &Value) -> ParleyError {
    let message = match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("message") {
            Some(Value::String(s)) => s.clone(),
            _ => error.to_string(),
        },
        other => other.to_string(),
    };
    ParleyError::backend(message)
}

/// Truncate long payloads for debug logs
pub fn preview(content: &str) -> &str {
    match content.char_indices().nth(500) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
