//! Agent orchestrator
//!
//! One orchestration run: ask the model, pull tool calls out of its reply,
//! run them, and ask the model again with the results. Only one round of
//! tool use is resolved; calls in the second reply are left as text.

use std::sync::Arc;

use crate::agent::transcript::Transcript;
use crate::core::{Config, Message, Result, Role, ToolResult};
use crate::llm::{GenerateOptions, LLMProvider, StreamCallback};
use crate::tools::{execute, extract, ToolRegistry};

/// Default system prompt when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Appended to the tool results before the second generation
const FOLLOW_UP_INSTRUCTION: &str =
    "Now provide your response to the user based on these tool results.";

/// Prompt text of a run as the model received it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentPrompt {
    /// System prompt, tool listing included
    pub system: String,
    /// Request message
    pub message: String,
}

/// Outcome of one orchestration run
#[derive(Debug, Clone)]
pub struct Completion {
    /// Final response text
    pub response: String,
    /// What the first generation was given
    pub prompt: SentPrompt,
    /// Transcript including this run's messages
    pub history: Transcript,
    /// Calls executed during the run, in execution order
    pub tool_calls_executed: Vec<ToolResult>,
}

/// Describe the registered tools and the call format to the model
pub fn tool_instructions(tools: &ToolRegistry) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let mut out = String::from(
        "You can use the following tools. To call one, reply with a JSON object such as \
         {\"name\": \"tool_name\", \"arguments\": {...}}.\n",
    );
    for def in tools.definitions() {
        out.push_str(&format!(
            "- {}: {} Parameters: {}\n",
            def.function.name, def.function.description, def.function.parameters
        ));
    }
    out
}

/// Build the follow-up prompt carrying tool results
pub fn follow_up_prompt(results: &[ToolResult]) -> String {
    let lines: Vec<String> = results.iter().map(ToolResult::summary_line).collect();
    format!("{}\n\n{}", lines.join("\n"), FOLLOW_UP_INSTRUCTION)
}

/// Agent that coordinates a model backend and local tools
pub struct Agent {
    config: Config,
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    system_prompt: String,
    on_token: Option<StreamCallback>,
}

impl Agent {
    /// Create an agent. The system prompt comes from configuration when
    /// set, otherwise a generic assistant prompt is used.
    pub fn new(config: Config, provider: Arc<dyn LLMProvider>, tools: ToolRegistry) -> Self {
        let system_prompt = config
            .agent
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        Self {
            config,
            provider,
            tools,
            system_prompt,
            on_token: None,
        }
    }

    /// Replace the system prompt with `prompts` joined by newlines
    pub fn with_system_prompts(mut self, prompts: Vec<String>) -> Self {
        self.system_prompt = prompts.join("\n");
        self
    }

    /// Receive tokens as they stream in (only used when streaming is on)
    pub fn with_token_callback(mut self, on_token: StreamCallback) -> Self {
        self.on_token = Some(on_token);
        self
    }

    /// Base system prompt, without the tool listing
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// System prompt as sent, tool listing included
    pub fn full_system_prompt(&self, base: &str) -> String {
        let instructions = tool_instructions(&self.tools);
        match (base.is_empty(), instructions.is_empty()) {
            (_, true) => base.to_string(),
            (true, false) => instructions,
            (false, false) => format!("{}\n\n{}", base, instructions),
        }
    }

    /// Registered tools
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Model backend
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Get current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if streaming is enabled
    pub fn is_streaming(&self) -> bool {
        self.config.streaming.enabled
    }

    /// Whether the backend is reachable and lists the configured model.
    /// Any failure counts as unavailable.
    pub async fn is_available(&self) -> bool {
        match self
            .provider
            .is_model_available(&self.config.model.name)
            .await
        {
            Ok(available) => available,
            Err(e) => {
                tracing::debug!("Backend availability check failed: {}", e);
                false
            }
        }
    }

    /// Run one orchestration round for `message`
    pub async fn completion(
        &self,
        message: &str,
        role: Role,
        history: Transcript,
    ) -> Result<Completion> {
        self.completion_with_prompt(&self.system_prompt, message, role, history)
            .await
    }

    /// `completion` with a per-call system prompt
    pub async fn completion_with_prompt(
        &self,
        system_prompt: &str,
        message: &str,
        role: Role,
        mut history: Transcript,
    ) -> Result<Completion> {
        let system = self.full_system_prompt(system_prompt);
        let prior: Vec<Message> = if self.config.agent.include_history {
            history.messages().to_vec()
        } else {
            Vec::new()
        };

        let request = Message::new(role, message);
        history.push(request.clone());

        let mut messages = Vec::with_capacity(prior.len() + 4);
        if !system.is_empty() {
            messages.push(Message::system(&system));
        }
        messages.extend(prior);
        messages.push(request);

        let first = self.generate(&messages).await?;
        tracing::debug!("Initial response: {}", first);
        history.push_assistant(&first);

        let prompt = SentPrompt {
            system,
            message: message.to_string(),
        };

        let calls = extract(&first);
        tracing::debug!("Extracted {} tool call(s)", calls.len());
        if calls.is_empty() {
            return Ok(Completion {
                response: first,
                prompt,
                history,
                tool_calls_executed: Vec::new(),
            });
        }

        let mut executed = Vec::with_capacity(calls.len());
        for call in calls {
            let result = execute(&call, &self.tools);
            tracing::debug!("Tool '{}' result: {}", call.name, result);
            history.push_tool(&call.name, &result);
            executed.push(ToolResult::new(call, result));
        }

        let follow_up = follow_up_prompt(&executed);
        tracing::debug!("Sending follow-up message:\n{}", follow_up);

        messages.push(Message::assistant(&first));
        messages.push(Message::user(follow_up));

        let final_response = self.generate(&messages).await?;
        tracing::debug!("Final response: {}", final_response);
        history.push_assistant(&final_response);

        Ok(Completion {
            response: final_response,
            prompt,
            history,
            tool_calls_executed: executed,
        })
    }

    /// Run with a user message
    pub async fn run(&self, message: &str, history: Transcript) -> Result<Completion> {
        self.completion(message, Role::User, history).await
    }

    /// Run with a user message and return only the response text. Failures
    /// come back as `Error: <message>`.
    pub async fn chat(&self, message: &str, history: Transcript) -> String {
        match self.run(message, history).await {
            Ok(completion) => completion.response,
            Err(e) => e.reply_text(),
        }
    }

    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let options = Some(GenerateOptions {
            temperature: Some(self.config.model.temperature),
            max_tokens: self.config.model.max_tokens,
            stream: self.config.streaming.enabled,
            ..Default::default()
        });
        let model = &self.config.model.name;

        let response = if self.config.streaming.enabled {
            let on_token: StreamCallback = match &self.on_token {
                Some(on_token) => Arc::clone(on_token),
                None => Arc::new(|_: &str| {}),
            };
            self.provider
                .chat_stream(model, messages, options, on_token)
                .await?
        } else {
            self.provider.chat(model, messages, options).await?
        };

        Ok(response.content.trim().to_string())
    }
}
