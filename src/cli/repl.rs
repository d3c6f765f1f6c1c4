//! Interactive REPL for Parley
//!
//! Provides the main user interaction loop.

use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::agent::{Agent, Completion, MemoryAgent, SentPrompt, Transcript};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Result};
use crate::inspect::PromptInspector;
use crate::llm::{create_provider, LLMProvider, StreamCallback};
use crate::memory::MemoryStore;
use crate::tools::{GetCurrentTime, ToolRegistry};

/// The agent flavor a session talks to
pub enum Assistant {
    /// Plain agent with the time tool
    Plain(Agent),
    /// Agent backed by a memory document
    Memory(MemoryAgent),
}

impl Assistant {
    /// Build the assistant described by `config`
    pub fn from_config(config: Config, provider: Arc<dyn LLMProvider>) -> Self {
        let on_token: StreamCallback = Arc::new(|token: &str| {
            print!("{}", token);
            let _ = io::stdout().flush();
        });

        if config.memory.enabled {
            Assistant::Memory(MemoryAgent::new(config, provider).with_token_callback(on_token))
        } else {
            let tools = ToolRegistry::from_tools(vec![Arc::new(GetCurrentTime::new())]);
            Assistant::Plain(Agent::new(config, provider, tools).with_token_callback(on_token))
        }
    }

    /// The underlying orchestrating agent
    pub fn agent(&self) -> &Agent {
        match self {
            Assistant::Plain(agent) => agent,
            Assistant::Memory(memory) => memory.agent(),
        }
    }

    /// Memory store, when memory is enabled
    pub fn memory(&self) -> Option<&MemoryStore> {
        match self {
            Assistant::Plain(_) => None,
            Assistant::Memory(memory) => Some(memory.store()),
        }
    }

    /// Run one turn
    pub async fn run(&self, message: &str, history: Transcript) -> Result<Completion> {
        match self {
            Assistant::Plain(agent) => agent.run(message, history).await,
            Assistant::Memory(memory) => memory.completion(message, history).await,
        }
    }
}

/// State carried across REPL turns
pub struct Session {
    pub assistant: Assistant,
    pub transcript: Transcript,
    /// Prompt of the last successful turn, as the model received it
    pub last_prompt: Option<SentPrompt>,
}

impl Session {
    pub fn new(assistant: Assistant) -> Self {
        Self {
            assistant,
            transcript: Transcript::new(),
            last_prompt: None,
        }
    }

    /// Send a user message, keeping the transcript
    pub async fn send(&mut self, input: &str) -> Result<String> {
        let history = std::mem::take(&mut self.transcript);
        let snapshot = history.clone();

        match self.assistant.run(input, history).await {
            Ok(completion) => {
                for result in &completion.tool_calls_executed {
                    println!("  [tool] {}", result.summary_line());
                }
                if self.assistant.agent().config().agent.debug {
                    self.log_prompt(&completion.prompt);
                }
                self.last_prompt = Some(completion.prompt);
                self.transcript = completion.history;
                Ok(completion.response)
            }
            Err(e) => {
                self.transcript = snapshot;
                Err(e)
            }
        }
    }

    fn log_prompt(&self, prompt: &SentPrompt) {
        let inspector = PromptInspector::new();
        let capture = inspector.capture_exact_prompt(
            &prompt.message,
            Some(&prompt.system),
            self.assistant.agent().tools().names(),
        );
        inspector.log(&capture);
    }
}

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    session: Session,
}

impl Repl {
    /// Create a REPL with custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = create_provider(&config)?;
        Ok(Self {
            session: Session::new(Assistant::from_config(config, provider)),
        })
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        print!("Checking backend...");
        io::stdout().flush()?;
        let config = self.session.assistant.agent().config();
        if self.session.assistant.agent().is_available().await {
            println!(" Ready!\n");
        } else {
            println!(
                "\nWarning: model '{}' is not available at {}. Requests may fail.\n",
                config.model.name,
                config.base_url()
            );
        }

        let streaming = config.streaming.enabled;
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

        loop {
            print!("You: ");
            io::stdout().flush()?;

            let input = match lines.next().await {
                None => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            };

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.session).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Clear) => {
                    println!("Conversation cleared.\n");
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::Continue(input)) => {
                    if streaming {
                        println!("\nAssistant:");
                    }
                    match self.session.send(&input).await {
                        // Tokens were already printed as they arrived
                        Ok(_) if streaming => println!("\n"),
                        Ok(response) => println!("\nAssistant:\n{}\n", response),
                        Err(e) => eprintln!("\n{}\n", e.reply_text()),
                    }
                }
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.session.assistant.agent().config();

        println!("\nParley - local model agent\n");
        println!("Backend:  {} ({})", config.base_url(), config.backend.kind);
        println!("Model:    {}", config.model.name);
        match self.session.assistant.memory() {
            Some(store) => println!("Memory:   {}", store.path().display()),
            None => println!("Memory:   disabled"),
        }
        println!();
        println!("Commands: help, history, memory, inspect, status, exit");
        println!("-----------------------------------------------------------");
    }
}
