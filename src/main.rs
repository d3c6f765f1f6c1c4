//! Parley - local model agent
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;

use parley::cli::Assistant;
use parley::core::init_logging;
use parley::llm::create_provider;
use parley::{BackendKind, Config, Repl, Transcript};

/// Parley - chat with a local model that can call tools
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model name as known by the backend
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Backend protocol: ollama or openai_compat
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Memory document path
    #[arg(long, short = 'M')]
    memory: Option<PathBuf>,

    /// Run without long-term memory
    #[arg(long)]
    no_memory: bool,

    /// Stream tokens as they are generated
    #[arg(long)]
    stream: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.model.name = model;
    }
    if let Some(base_url) = args.base_url {
        config.backend.base_url = base_url;
    }
    if let Some(kind) = args.backend {
        config.backend.kind = kind;
    }
    if let Some(path) = args.memory {
        config.memory.path = path;
    }
    if args.no_memory {
        config.memory.enabled = false;
    }
    if args.stream {
        config.streaming.enabled = true;
    }
    if args.debug {
        config.agent.debug = true;
    }

    init_logging(if config.agent.debug { "parley=debug" } else { "warn" });

    if args.save_config {
        let path = config.save()?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let provider = create_provider(&config)?;
        let streaming = config.streaming.enabled;
        let assistant = Assistant::from_config(config, provider);

        match assistant.run(&prompt, Transcript::new()).await {
            // Tokens were already printed as they arrived
            Ok(_) if streaming => println!(),
            Ok(completion) => println!("{}", completion.response),
            Err(e) => {
                if streaming {
                    println!();
                }
                println!("{}", e.reply_text());
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config)?;
    repl.run().await?;

    Ok(())
}
