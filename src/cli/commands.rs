//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use std::path::Path;

use crate::cli::repl::Session;
use crate::core::{Result, Role};
use crate::inspect::{InspectSection, PromptInspector};

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Clear history
    Clear,
}

const MEMORY_DISABLED: &str = "Memory is disabled (started with --no-memory).";

/// Parse and handle special commands
pub async fn handle_command(input: &str, session: &mut Session) -> Result<CommandResult> {
    let input = input.trim();
    let (cmd, args) = match input.split_once(' ') {
        Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
        None => (input.to_lowercase(), ""),
    };

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "clear" | "reset" => {
            session.transcript.clear();
            Ok(CommandResult::Clear)
        }

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "history" => Ok(CommandResult::Handled(history_text(session))),

        "memory" => Ok(CommandResult::Handled(match session.assistant.memory() {
            Some(store) => store.get_memory_summary(),
            None => MEMORY_DISABLED.to_string(),
        })),

        "facts" => {
            let Some(store) = session.assistant.memory() else {
                return Ok(CommandResult::Handled(MEMORY_DISABLED.to_string()));
            };
            let facts = store.get_facts();
            if facts.is_empty() {
                return Ok(CommandResult::Handled("No facts stored.".to_string()));
            }
            let lines: Vec<String> = facts
                .iter()
                .map(|f| format!("  [{}] {}", f.timestamp, f.content))
                .collect();
            Ok(CommandResult::Handled(lines.join("\n")))
        }

        "forget" => {
            let Some(store) = session.assistant.memory() else {
                return Ok(CommandResult::Handled(MEMORY_DISABLED.to_string()));
            };
            if args.is_empty() {
                return Ok(CommandResult::Handled("Usage: forget <key>".to_string()));
            }
            let output = if store.remove_preference(args)? {
                format!("Forgot preference '{}'", args)
            } else {
                format!("No preference named '{}'", args)
            };
            Ok(CommandResult::Handled(output))
        }

        "wipe" => {
            let Some(store) = session.assistant.memory() else {
                return Ok(CommandResult::Handled(MEMORY_DISABLED.to_string()));
            };
            store.clear()?;
            Ok(CommandResult::Handled("Memory cleared.".to_string()))
        }

        "status" => Ok(CommandResult::Handled(status_text(session))),

        "inspect" => inspect(args, session),

        _ => {
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

fn history_text(session: &Session) -> String {
    if session.transcript.is_empty() {
        return "No messages yet.".to_string();
    }
    session
        .transcript
        .last_n(20)
        .iter()
        .map(|m| match (m.role, &m.tool_name) {
            (Role::Tool, Some(name)) => format!("[tool:{}] {}", name, m.content),
            (role, _) => format!("[{}] {}", role, m.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn status_text(session: &Session) -> String {
    let agent = session.assistant.agent();
    let config = agent.config();
    let memory = session
        .assistant
        .memory()
        .map(|s| s.path().display().to_string())
        .unwrap_or_else(|| "disabled".to_string());

    format!(
        "Parley Status:\n\
         -----------------------------\n\
         Backend:   {} ({})\n\
         Model:     {}\n\
         Tools:     {}\n\
         Memory:    {}\n\
         Streaming: {}\n\
         History:   {} messages",
        config.base_url(),
        agent.provider().name(),
        config.model.name,
        agent.tools().names().join(", "),
        memory,
        if config.streaming.enabled { "on" } else { "off" },
        session.transcript.len(),
    )
}

/// Dump the last prompt and the backend's recorded context
fn inspect(args: &str, session: &Session) -> Result<CommandResult> {
    let agent = session.assistant.agent();
    let context = agent.provider().inspector();

    let mut sections = Vec::new();
    if session.last_prompt.is_some() {
        sections.push(InspectSection::ExactPrompt);
    }
    if let Some(context) = context {
        sections.push(InspectSection::ContextState);
        if !context.context_tokens().is_empty() {
            sections.push(InspectSection::Structured);
        }
    }
    if sections.is_empty() {
        return Ok(CommandResult::Handled("Nothing to inspect yet.".to_string()));
    }

    let sent = session.last_prompt.as_ref();
    let mut inspector = PromptInspector::new().with_sections(sections);
    let capture = inspector.capture_all(
        sent.map(|p| p.message.as_str()),
        sent.map(|p| p.system.as_str()),
        agent.tools().names(),
        context,
    )?;

    if args.is_empty() {
        return Ok(CommandResult::Handled(inspector.format_output(&capture)));
    }

    let path = Path::new(args);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        inspector.output_dir = parent.to_path_buf();
    }
    if let Some(name) = path.file_name() {
        inspector.filename = name.to_string_lossy().into_owned();
    }
    let written = inspector.save_to_file(&capture, None)?;
    Ok(CommandResult::Handled(format!(
        "Prompt debug output written to {}",
        written.display()
    )))
}

/// Generate help text
fn help_text() -> String {
    r#"Parley Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit Parley
  clear, reset     Clear conversation history
  history          Show recent messages
  status           Show current configuration

  memory           Show the long-term memory summary
  facts            List stored facts
  forget <key>     Remove a stored preference
  wipe             Clear all long-term memory

  inspect [path]   Show the last prompt and backend context,
                   or write them to a file

Keyboard Shortcuts:
  Ctrl+D           Exit Parley
─────────────────────────────────────────────"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, MemoryAgent};
    use crate::cli::repl::Assistant;
    use crate::core::{Config, Message};
    use crate::llm::{GenerateOptions, LLMProvider, LLMResponse, StreamCallback};
    use crate::memory::MemoryStore;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Offline;

    #[async_trait]
    impl LLMProvider for Offline {
        async fn chat(
            &self,
            _model: &str,
            _messages: &[Message],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            Err(crate::core::ParleyError::backend("offline"))
        }

        async fn chat_stream(
            &self,
            model: &str,
            messages: &[Message],
            options: Option<GenerateOptions>,
            _on_token: StreamCallback,
        ) -> Result<LLMResponse> {
            self.chat(model, messages, options).await
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "offline"
        }
    }

    /// Always answers with the same text
    struct Canned(&'static str);

    #[async_trait]
    impl LLMProvider for Canned {
        async fn chat(
            &self,
            model: &str,
            _messages: &[Message],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            Ok(LLMResponse {
                content: self.0.to_string(),
                usage: None,
                model: model.to_string(),
            })
        }

        async fn chat_stream(
            &self,
            model: &str,
            messages: &[Message],
            options: Option<GenerateOptions>,
            _on_token: StreamCallback,
        ) -> Result<LLMResponse> {
            self.chat(model, messages, options).await
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn memory_session(store: MemoryStore) -> Session {
        let agent = MemoryAgent::with_store(Config::default(), Arc::new(Offline), store);
        Session::new(Assistant::Memory(agent))
    }

    fn run(input: &str, session: &mut Session) -> CommandResult {
        tokio_test::block_on(handle_command(input, session)).unwrap()
    }

    #[test]
    fn test_basic_commands() {
        let agent = Agent::new(Config::default(), Arc::new(Offline), ToolRegistry::new());
        let mut session = Session::new(Assistant::Plain(agent));
        session.transcript.push_user("hi");

        assert_eq!(run("exit", &mut session), CommandResult::Exit);
        assert_eq!(run("CLEAR", &mut session), CommandResult::Clear);
        assert!(session.transcript.is_empty());
        assert_eq!(
            run("what time is it?", &mut session),
            CommandResult::Continue("what time is it?".to_string())
        );
        assert_eq!(
            run("memory", &mut session),
            CommandResult::Handled(MEMORY_DISABLED.to_string())
        );
        assert!(matches!(run("/bogus", &mut session), CommandResult::Handled(s) if s.starts_with("Unknown command")));
        assert_eq!(
            run("inspect", &mut session),
            CommandResult::Handled("Nothing to inspect yet.".to_string())
        );
    }

    #[test]
    fn test_memory_commands() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("memory.json"));
        store.add_fact("User's name is Alex").unwrap();
        store.add_preference("editor", "vim").unwrap();
        let mut session = memory_session(store.clone());

        match run("memory", &mut session) {
            CommandResult::Handled(summary) => {
                assert!(summary.contains("- User's name is Alex\n"));
                assert!(summary.contains("- editor: vim\n"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            run("forget editor", &mut session),
            CommandResult::Handled("Forgot preference 'editor'".to_string())
        );
        assert_eq!(
            run("forget editor", &mut session),
            CommandResult::Handled("No preference named 'editor'".to_string())
        );

        run("wipe", &mut session);
        assert!(store.get_facts().is_empty());
    }

    #[test]
    fn test_history_lists_tool_names() {
        let agent = Agent::new(Config::default(), Arc::new(Offline), ToolRegistry::new());
        let mut session = Session::new(Assistant::Plain(agent));
        session.transcript.push_user("What time is it?");
        session.transcript.push_tool("getCurrentTime", "03:15 PM");

        assert_eq!(
            run("history", &mut session),
            CommandResult::Handled(
                "[user] What time is it?\n[tool:getCurrentTime] 03:15 PM".to_string()
            )
        );
    }

    #[test]
    fn test_inspect_shows_prompt_as_sent() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("memory.json"));
        store.add_fact("Name is Alex").unwrap();
        let agent =
            MemoryAgent::with_store(Config::default(), Arc::new(Canned("Hello Alex!")), store.clone());
        let mut session = Session::new(Assistant::Memory(agent));

        let reply = tokio_test::block_on(session.send("hi")).unwrap();
        assert_eq!(reply, "Hello Alex!");
        store.add_fact("Likes tea").unwrap();

        let output = match run("inspect", &mut session) {
            CommandResult::Handled(output) => output,
            other => panic!("unexpected {:?}", other),
        };
        assert!(output.contains(
            "<|im_start|>user\n[MEMORY CONTEXT]\n\n=== LONG-TERM MEMORY ===\n\n\
             Known Facts:\n- Name is Alex\n\n\n[USER MESSAGE]\nhi<|im_end|>"
        ));
        assert!(output.contains("<|im_start|>system\nYou are a helpful assistant with long-term memory."));
        assert!(!output.contains("Likes tea"));
    }

    #[test]
    fn test_failed_turn_keeps_previous_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = memory_session(MemoryStore::new(dir.path().join("memory.json")));

        assert!(tokio_test::block_on(session.send("hi")).is_err());
        assert!(session.last_prompt.is_none());
        assert!(session.transcript.is_empty());
    }

    #[test]
    fn test_debug_session_records_prompt() {
        let mut config = Config::default();
        config.agent.debug = true;
        let agent = Agent::new(config, Arc::new(Canned("It's noon.")), ToolRegistry::new());
        let mut session = Session::new(Assistant::Plain(agent));

        tokio_test::block_on(session.send("time?")).unwrap();
        let sent = session.last_prompt.clone().unwrap();
        assert_eq!(sent.message, "time?");
        assert_eq!(sent.system, "You are a helpful assistant.");
        assert_eq!(session.transcript.len(), 2);
    }
}
