//! Configuration management for Parley
//!
//! Defaults are plain constants. `Config::load` layers a `.env` file, the
//! TOML config file and `PARLEY_*` environment variables on top of them;
//! the resulting struct is passed explicitly to every constructor.
//!
//! Config file location: ~/.config/parley/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{ParleyError, Result};

/// Main configuration for Parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model backend configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Model and sampling configuration
    #[serde(default)]
    pub model: ModelConfig,
    /// Agent configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Long-term memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Streaming configuration
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Which wire protocol the backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Native Ollama API (`/api/chat`)
    #[default]
    Ollama,
    /// OpenAI-compatible API (`/chat/completions`), e.g. llama-server
    #[serde(rename = "openai_compat")]
    OpenAiCompat,
}

impl std::str::FromStr for BackendKind {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "openai" | "openai_compat" | "openai-compat" | "llama-server" => {
                Ok(BackendKind::OpenAiCompat)
            }
            other => Err(ParleyError::config(format!("Unknown backend: {}", other))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Ollama => write!(f, "ollama"),
            BackendKind::OpenAiCompat => write!(f, "openai_compat"),
        }
    }
}

/// Model backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Wire protocol
    pub kind: BackendKind,
    /// Base URL, e.g. `http://localhost:11434` or `http://127.0.0.1:8123/v1`
    pub base_url: String,
    /// Request timeout in seconds (0 disables the timeout)
    pub timeout_secs: u64,
    /// Tokenize the recorded context through the server's `/tokenize`
    /// endpoint (llama.cpp server only)
    #[serde(default)]
    pub tokenize_context: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 120,
            tokenize_context: false,
        }
    }
}

/// Model and sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name as known by the backend
    pub name: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "mistral:7b-instruct".to_string(),
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// Agent behavior configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Whether to log prompts and replies at debug level
    pub debug: bool,
    /// System prompt override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Send the caller's prior transcript along with each generation
    #[serde(default)]
    pub include_history: bool,
}

/// Long-term memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Whether the memory agent is used
    pub enabled: bool,
    /// Path of the JSON memory document
    pub path: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./agent-memory.json"),
        }
    }
}

/// Streaming configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Whether to stream responses from the backend
    pub enabled: bool,
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| v == "true" || v == "1")
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env();
        config
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(ParleyError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ParleyError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ParleyError::config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `PARLEY_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(kind) = env::var("PARLEY_BACKEND") {
            match kind.parse() {
                Ok(kind) => self.backend.kind = kind,
                Err(e) => tracing::warn!("Ignoring PARLEY_BACKEND: {}", e),
            }
        }
        if let Ok(url) = env::var("PARLEY_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Ok(model) = env::var("PARLEY_MODEL") {
            self.model.name = model;
        }
        if let Ok(path) = env::var("PARLEY_MEMORY_FILE") {
            self.memory.path = PathBuf::from(path);
        }
        if let Some(debug) = env_flag("PARLEY_DEBUG") {
            self.agent.debug = debug;
        }
        if let Some(streaming) = env_flag("PARLEY_STREAMING") {
            self.streaming.enabled = streaming;
        }
    }

    /// Save configuration to the default config file, returning its path
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_file();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration as TOML at `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.exists()) {
            fs::create_dir_all(dir)
                .map_err(|e| ParleyError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ParleyError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| ParleyError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Check that the backend URL is usable
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.backend.base_url).map_err(|e| {
            ParleyError::config(format!("Invalid base_url '{}': {}", self.backend.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ParleyError::config(format!(
                "Unsupported base_url scheme: {}",
                url.scheme()
            )));
        }
        if self.model.name.trim().is_empty() {
            return Err(ParleyError::config("Model name is empty"));
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> String {
        self.backend.base_url.trim_end_matches('/').to_string()
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.kind, BackendKind::Ollama);
        assert_eq!(config.base_url(), "http://localhost:11434");
        assert_eq!(config.model.name, "mistral:7b-instruct");
        assert_eq!(config.memory.path, PathBuf::from("./agent-memory.json"));
        assert!(!config.streaming.enabled);
        assert!(!config.agent.include_history);
    }

    #[test]
    fn test_save_writes_loadable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.backend.kind = BackendKind::OpenAiCompat;
        config.model.name = "qwen3:8b".to_string();
        config.memory.enabled = false;
        config.save_to(&path).unwrap();

        let loaded = Config::from_toml(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.backend.kind, BackendKind::OpenAiCompat);
        assert_eq!(loaded.model.name, "qwen3:8b");
        assert!(!loaded.memory.enabled);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [backend]
            kind = "openai_compat"
            base_url = "http://127.0.0.1:8123/v1/"
            timeout_secs = 0

            [model]
            name = "Qwen3-1.7B-GGUF:Q4_K_M"
            temperature = 0.2
            max_tokens = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.kind, BackendKind::OpenAiCompat);
        assert_eq!(config.base_url(), "http://127.0.0.1:8123/v1");
        assert_eq!(config.model.max_tokens, Some(500));
        assert!(config.memory.enabled);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("ollama".parse::<BackendKind>().unwrap(), BackendKind::Ollama);
        assert_eq!(
            "llama-server".parse::<BackendKind>().unwrap(),
            BackendKind::OpenAiCompat
        );
        assert!("gpt".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.backend.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.backend.base_url = "ftp://host".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = Config::default_config_toml();
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("mistral:7b-instruct"));
    }
}
