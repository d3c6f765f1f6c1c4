//! Agent module - orchestration and conversation management
//!
//! Contains the agent that coordinates model calls and tool execution, the
//! memory-backed variant, and the transcript they share with callers.

pub mod memory_agent;
pub mod orchestrator;
pub mod transcript;

pub use memory_agent::MemoryAgent;
pub use orchestrator::{follow_up_prompt, tool_instructions, Agent, Completion, SentPrompt};
pub use transcript::Transcript;
