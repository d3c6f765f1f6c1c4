//! Custom error types for Parley
//!
//! `ParleyError` covers every fallible library boundary. `ToolError` is the
//! typed failure of a single tool invocation; it only becomes a string where
//! the result is handed back to the model.

use thiserror::Error;

/// Main error type for Parley operations
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Model backend unreachable or returned a failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Model not available on the backend
    #[error("Model '{0}' not available on the backend")]
    ModelNotFound(String),

    /// Malformed data from the backend or a file
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;

impl ParleyError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The failure as it is shown in place of a reply
    pub fn reply_text(&self) -> String {
        format!("Error: {}", self)
    }
}

/// Failure of a single tool invocation.
///
/// The `Display` output is exactly what gets fed back to the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The call carried no usable name
    #[error("Error: Invalid tool call format")]
    InvalidFormat,

    /// No registry entry for the name
    #[error("Error: Unknown tool '{0}'")]
    UnknownTool(String),

    /// Arguments did not bind to the tool's parameters
    #[error("Error executing {name}: {message}")]
    InvalidArguments { name: String, message: String },

    /// The tool ran and failed
    #[error("Error executing {name}: {message}")]
    Execution { name: String, message: String },
}

impl ToolError {
    /// Create an execution error
    pub fn execution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an argument binding error
    pub fn invalid_arguments(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            name: name.into(),
            message: message.into(),
        }
    }
}
