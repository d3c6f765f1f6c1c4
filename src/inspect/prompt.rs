//! Prompt and context capture for debugging
//!
//! Renders what was sent to the model, the backend's recorded context, and
//! its token breakdown into a fixed plain-text block that can be logged or
//! written to a file.

use chrono::Local;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::{Message, ParleyError, Result};
use crate::llm::{render_chatml, ContextInspect};

/// Part of the debug output to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InspectSection {
    /// The formatted prompt for the current user input
    #[default]
    ExactPrompt,
    /// The full recorded context, replies included
    ContextState,
    /// Token-level breakdown of the recorded context
    Structured,
}

/// Token ids with their texts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredTokens {
    pub tokens: Vec<u32>,
    pub token_strings: Vec<String>,
    pub length: usize,
}

/// Captured debug data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    pub timestamp: String,
    pub prompt: Option<String>,
    pub system_prompt: Option<String>,
    pub functions: Vec<String>,
    pub exact_prompt: Option<String>,
    pub context_state: Option<String>,
    pub context_token_count: Option<usize>,
    pub structured: Option<StructuredTokens>,
    pub structured_token_count: Option<usize>,
}

fn now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn count_or_na(count: Option<usize>) -> String {
    count.map_or_else(|| "N/A".to_string(), |c| c.to_string())
}

/// Captures prompts and context state and writes them out
#[derive(Debug, Clone)]
pub struct PromptInspector {
    pub output_dir: PathBuf,
    pub filename: String,
    pub include_timestamp: bool,
    pub append_mode: bool,
    pub sections: Vec<InspectSection>,
}

impl Default for PromptInspector {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./"),
            filename: "prompt_debug.txt".to_string(),
            include_timestamp: false,
            append_mode: false,
            sections: vec![InspectSection::default()],
        }
    }
}

impl PromptInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select which sections `capture_all` produces
    pub fn with_sections(mut self, sections: Vec<InspectSection>) -> Self {
        self.sections = sections;
        self
    }

    /// Capture the formatted prompt for a single user input
    pub fn capture_exact_prompt(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        tool_names: &[String],
    ) -> Capture {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));

        Capture {
            timestamp: now(),
            prompt: Some(prompt.to_string()),
            system_prompt: system_prompt.map(str::to_string),
            functions: tool_names.to_vec(),
            exact_prompt: Some(render_chatml(&messages)),
            ..Default::default()
        }
    }

    /// Capture the backend's recorded context
    pub fn capture_context_state(&self, context: &dyn ContextInspect) -> Capture {
        Capture {
            timestamp: now(),
            context_state: Some(context.context_text()),
            context_token_count: Some(context.token_count()),
            ..Default::default()
        }
    }

    /// Capture the token breakdown of the recorded context
    pub fn capture_structured(&self, context: &dyn ContextInspect) -> Capture {
        let tokens = context.context_tokens();
        let length = tokens.len();
        Capture {
            timestamp: now(),
            structured: Some(StructuredTokens {
                tokens,
                token_strings: context.token_pieces(),
                length,
            }),
            structured_token_count: Some(length),
            ..Default::default()
        }
    }

    /// Capture every configured section
    pub fn capture_all(
        &self,
        prompt: Option<&str>,
        system_prompt: Option<&str>,
        tool_names: &[String],
        context: Option<&dyn ContextInspect>,
    ) -> Result<Capture> {
        let mut result = Capture {
            timestamp: now(),
            ..Default::default()
        };

        if self.sections.contains(&InspectSection::ExactPrompt) {
            let prompt = prompt
                .ok_or_else(|| ParleyError::config("a prompt is required for the exact prompt"))?;
            let exact = self.capture_exact_prompt(prompt, system_prompt, tool_names);
            result.prompt = exact.prompt;
            result.system_prompt = exact.system_prompt;
            result.functions = exact.functions;
            result.exact_prompt = exact.exact_prompt;
        }

        if self.sections.contains(&InspectSection::ContextState) {
            let context = context.ok_or_else(|| {
                ParleyError::config("backend context is required for the context state")
            })?;
            let state = self.capture_context_state(context);
            result.context_state = state.context_state;
            result.context_token_count = state.context_token_count;
        }

        if self.sections.contains(&InspectSection::Structured) {
            let context = context.ok_or_else(|| {
                ParleyError::config("backend context is required for the token breakdown")
            })?;
            let structured = self.capture_structured(context);
            result.structured = structured.structured;
            result.structured_token_count = structured.structured_token_count;
        }

        Ok(result)
    }

    /// Render captured data as the debug text block
    pub fn format_output(&self, captured: &Capture) -> String {
        let mut output = String::from("\n========== PROMPT DEBUG OUTPUT ==========\n");
        output.push_str(&format!("Timestamp: {}\n", captured.timestamp));

        if let Some(prompt) = captured.prompt.as_deref().filter(|p| !p.is_empty()) {
            output.push_str(&format!("Original Prompt: {}\n", prompt));
        }

        if let Some(system) = captured.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            let preview = match system.char_indices().nth(50) {
                Some((idx, _)) => format!("{}...", &system[..idx]),
                None => system.to_string(),
            };
            output.push_str(&format!("System Prompt: {}\n", preview));
        }

        if !captured.functions.is_empty() {
            output.push_str(&format!("Functions: {}\n", captured.functions.join(", ")));
        }

        if let Some(exact) = &captured.exact_prompt {
            output.push_str("\n=== EXACT PROMPT ===\n");
            output.push_str(exact);
            output.push('\n');
        }

        if let Some(state) = &captured.context_state {
            output.push_str(&format!(
                "Token Count: {}\n",
                count_or_na(captured.context_token_count)
            ));
            output.push_str("\n=== CONTEXT STATE ===\n");
            output.push_str(state);
            output.push('\n');
        }

        if let Some(structured) = &captured.structured {
            output.push_str("\n=== STRUCTURED ===\n");
            output.push_str(&format!(
                "Token Count: {}\n",
                count_or_na(captured.structured_token_count)
            ));
            let json = serde_json::to_string_pretty(structured)
                .unwrap_or_else(|e| format!("<unserializable: {}>", e));
            output.push_str(&json);
            output.push('\n');
        }

        output.push_str("==========================================\n");
        output
    }

    fn target_path(&self, custom_filename: Option<&str>) -> PathBuf {
        let filename = custom_filename.unwrap_or(&self.filename);
        let filename = if self.include_timestamp {
            let stamp = now().replace([':', '.'], "-");
            let path = Path::new(filename);
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match path.extension() {
                Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
                None => format!("{}_{}", stem, stamp),
            }
        } else {
            filename.to_string()
        };
        self.output_dir.join(filename)
    }

    /// Write the formatted block to a file, returning its path
    pub fn save_to_file(&self, captured: &Capture, custom_filename: Option<&str>) -> Result<PathBuf> {
        let path = self.target_path(custom_filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append_mode)
            .truncate(!self.append_mode)
            .open(&path)?;
        file.write_all(self.format_output(captured).as_bytes())?;

        tracing::info!("Prompt debug output written to {}", path.display());
        Ok(path)
    }

    /// Emit the formatted block through the log
    pub fn log(&self, captured: &Capture) {
        tracing::info!("{}", self.format_output(captured));
    }
}
