//! Parley - tool-using agent for local models
//!
//! Talks to a locally hosted model (Ollama or an OpenAI-compatible server
//! such as llama-server), recognizes tool calls the model writes into its
//! reply text, runs them, and feeds the results back for a final answer.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, logging and error handling
//! - **LLM**: Backend abstraction with Ollama and OpenAI-compatible clients
//! - **Tools**: Tool-call extraction, registry, executor and built-in tools
//! - **Memory**: JSON-backed long-term memory
//! - **Agent**: Single-round orchestration and the memory agent
//! - **Inspect**: Prompt and context debugging output
//! - **CLI**: REPL and commands
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parley::{create_provider, Agent, Config, GetCurrentTime, ToolRegistry, Transcript};
//!
//! #[tokio::main]
//! async fn main() -> parley::Result<()> {
//!     let config = Config::load();
//!     let provider = create_provider(&config)?;
//!     let tools = ToolRegistry::from_tools(vec![Arc::new(GetCurrentTime::new())]);
//!     let agent = Agent::new(config, provider, tools);
//!
//!     let completion = agent.run("What time is it?", Transcript::new()).await?;
//!     println!("{}", completion.response);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod inspect;
pub mod llm;
pub mod memory;
pub mod tools;

// Re-export commonly used items
pub use agent::{Agent, Completion, MemoryAgent, SentPrompt, Transcript};
pub use cli::Repl;
pub use core::{BackendKind, Config, Message, ParleyError, Result, Role, ToolCall, ToolError};
pub use llm::{create_provider, LLMProvider};
pub use memory::MemoryStore;
pub use tools::{extract, execute, GetCurrentTime, SaveMemory, Tool, ToolRegistry};
