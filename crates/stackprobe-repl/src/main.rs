use std::path::PathBuf;

use clap::Parser;
use stackprobe::prelude::*;
use stackprobe_repl::{Command, Repl, Step, load_session};
use tokio::io::{AsyncBufReadExt, BufReader};

const OFFLINE_REPLY: &str = "(offline) No model is configured. Run without --offline and set \
                             OPENROUTER_KEY to get real answers.";

/// Ask natural-language questions about a paused program.
#[derive(Parser)]
#[command(name = "stackprobe")]
struct Cli {
    /// JSON stack snapshot to load.
    snapshot: PathBuf,

    /// Ask one question and exit.
    #[arg(long)]
    query: Option<String>,

    /// Model that picks tools and searches files.
    #[arg(long)]
    agent_model: Option<String>,

    /// Model that writes the final answer.
    #[arg(long)]
    answer_model: Option<String>,

    /// Maximum tool-selection rounds per question.
    #[arg(long)]
    max_depth: Option<u32>,

    /// Let navigation stop at library and runtime frames.
    #[arg(long)]
    show_external_frames: bool,

    /// Do not draw progress spinners.
    #[arg(long)]
    no_progress: bool,

    /// Disable the `file` search tool.
    #[arg(long)]
    no_file_search: bool,

    /// Use canned replies instead of calling a model.
    #[arg(long)]
    offline: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::from_env()
            .with_show_progress(!self.no_progress)
            .with_file_search(!self.no_file_search);
        if let Some(model) = &self.agent_model {
            config = config.with_agent_model(model.clone());
        }
        if let Some(model) = &self.answer_model {
            config = config.with_answer_model(model.clone());
        }
        if let Some(depth) = self.max_depth {
            config = config.with_max_depth(depth);
        }
        if self.show_external_frames {
            config = config.with_hide_external_frames(false);
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.agent_config();
    let session = match load_session(&cli.snapshot, config.hide_external_frames) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let offline = ScriptedProvider::new().with_fallback(ChatCompletion::text(OFFLINE_REPLY));
    let client;
    let provider: &dyn CompletionProvider = if cli.offline {
        &offline
    } else {
        let api_key = match std::env::var("OPENROUTER_KEY") {
            Ok(key) => key,
            Err(_) => {
                eprintln!("Error: OPENROUTER_KEY environment variable is not set (or use --offline)");
                std::process::exit(1);
            }
        };
        client = match OpenRouterClient::new(api_key) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: failed to create API client: {e}");
                std::process::exit(1);
            }
        };
        &client
    };

    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(FnEventHandler::new(|event| {
            if let AgentEvent::ToolExecuting { name, arguments } = event {
                eprintln!("  [{name}] {arguments}");
            }
        }));
    let agent = Agent::new(provider, config).with_event_handler(&handler);
    let mut repl = Repl::new(agent, session);

    if let Some(query) = cli.query {
        if let Step::Print(text) = repl.handle(Command::Ask(query)).await {
            println!("{text}");
        }
        return;
    }

    println!("{}", repl.location());
    println!("Type 'help' for a list of commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("(stackprobe) ");
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: failed to read input: {e}");
                break;
            }
        };
        match repl.handle(Command::parse(&line)).await {
            Step::Print(text) => println!("{text}"),
            Step::Silent => {}
            Step::Quit => break,
        }
    }
}
