//! Agent with long-term memory
//!
//! Wraps [`Agent`] with a [`MemoryStore`]. The memory summary is rebuilt on
//! every turn, placed in the system prompt and prefixed to the user message,
//! and the model can add to it through the `saveMemory` tool.

use std::sync::Arc;

use crate::agent::orchestrator::{Agent, Completion};
use crate::agent::transcript::Transcript;
use crate::core::{Config, Result, Role};
use crate::llm::{LLMProvider, StreamCallback};
use crate::memory::MemoryStore;
use crate::tools::{GetCurrentTime, SaveMemory, Tool, ToolRegistry};

/// Agent whose prompts carry the contents of a memory document
pub struct MemoryAgent {
    agent: Agent,
    store: MemoryStore,
}

impl MemoryAgent {
    /// Create a memory agent using the store at `config.memory.path`
    pub fn new(config: Config, provider: Arc<dyn LLMProvider>) -> Self {
        let store = MemoryStore::new(config.memory.path.clone());
        Self::with_store(config, provider, store)
    }

    /// Create a memory agent over an explicit store
    pub fn with_store(config: Config, provider: Arc<dyn LLMProvider>, store: MemoryStore) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(GetCurrentTime::new()),
            Arc::new(SaveMemory::new(store.clone())),
        ];
        let agent = Agent::new(config, provider, ToolRegistry::from_tools(tools));
        Self { agent, store }
    }

    /// Receive tokens as they stream in
    pub fn with_token_callback(mut self, on_token: StreamCallback) -> Self {
        self.agent = self.agent.with_token_callback(on_token);
        self
    }

    /// The wrapped agent
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The backing memory store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// System prompt built from the current memory contents
    pub fn prepare_prompt(&self) -> String {
        format!(
            "You are a helpful assistant with long-term memory.\n{}\n\n\
             When the user shares important information about themselves, their preferences, or facts\n\
             they want you to remember, use the saveMemory function to store it.",
            self.store.get_memory_summary()
        )
    }

    /// Prefix a user message with the current memory contents
    pub fn contextualize(&self, message: &str) -> String {
        format!(
            "[MEMORY CONTEXT]\n{}\n\n[USER MESSAGE]\n{}",
            self.store.get_memory_summary(),
            message
        )
    }

    /// Run one orchestration round with fresh memory context
    pub async fn completion(&self, message: &str, history: Transcript) -> Result<Completion> {
        let system_prompt = self.prepare_prompt();
        let message = self.contextualize(message);
        self.agent
            .completion_with_prompt(&system_prompt, &message, Role::User, history)
            .await
    }

    /// Like [`Agent::chat`], with memory context
    pub async fn chat(&self, message: &str, history: Transcript) -> String {
        match self.completion(message, history).await {
            Ok(completion) => completion.response,
            Err(e) => e.reply_text(),
        }
    }

    /// Whether the backend is reachable and lists the configured model
    pub async fn is_available(&self) -> bool {
        self.agent.is_available().await
    }
}
