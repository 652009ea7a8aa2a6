mod config;
mod driver;
mod error;
mod fetch;
mod search;
mod session;
mod tools;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use agent::{AgentEvent, Budget};
use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use config::Config;
use driver::{ChatMode, ChatRequest, ChatTurn, Driver};
use error::Result;
use session::Session;

#[derive(Parser)]
#[command(name = "research", about = "Session-scoped autonomous research agent")]
struct Cli {
    /// Model identifier, e.g. gpt-4o or gpt-4o-mini.
    #[arg(long, global = true, default_value = "gpt-4o")]
    model: String,

    /// Directory that holds session folders.
    #[arg(long, global = true, default_value = "research_sessions")]
    base_dir: PathBuf,

    /// Ceiling on agent turns per run.
    #[arg(long, global = true)]
    max_turns: Option<u32>,

    /// Ceiling on estimated spend per run, in USD.
    #[arg(long, global = true)]
    max_cost: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one autonomous research request to completion.
    Run {
        /// Topic to research.
        topic: String,
    },
    /// Interactive chat: fresh research, or follow-up over a finished session.
    Chat {
        /// Existing session root to continue in.
        #[arg(long)]
        session: Option<PathBuf>,

        /// Answer questions about a completed session instead of researching.
        #[arg(long, requires = "session")]
        follow_up: bool,
    },
}

fn config_from(cli: &Cli) -> Config {
    let mut config = Config {
        model: cli.model.clone(),
        ..Config::default()
    };
    if let Some(max_turns) = cli.max_turns {
        config.budget = Budget {
            max_turns,
            ..config.budget
        };
    }
    if let Some(max_cost_usd) = cli.max_cost {
        config.budget = Budget {
            max_cost_usd,
            ..config.budget
        };
    }
    config
}

fn describe_tool(name: &str, input: &serde_json::Value) -> String {
    match name {
        "web_search" => {
            let query = input.get("query").and_then(|q| q.as_str()).unwrap_or("");
            format!("searching: {query}")
        }
        "download_papers" => {
            let count = input
                .get("urls")
                .and_then(|u| u.as_array())
                .map(|u| u.len())
                .unwrap_or(0);
            format!("downloading {count} papers")
        }
        "read_document" => {
            let file = input.get("filename").and_then(|f| f.as_str()).unwrap_or("");
            format!("reading: {file}")
        }
        "save_note" => {
            let title = input.get("title").and_then(|t| t.as_str()).unwrap_or("");
            format!("saving note: {title}")
        }
        "list_notes" => "gathering notes".to_string(),
        "write_report" => "writing report".to_string(),
        other => other.to_string(),
    }
}

/// Streams one turn to the terminal; returns the assistant's full reply.
async fn stream_turn(
    driver: &Driver,
    request: ChatRequest,
) -> Result<(Arc<Session>, String)> {
    let (session, mut events) = driver.chat(request)?;

    let mut reply = String::new();
    while let Some(event) = events.next().await {
        match event {
            AgentEvent::TextChunk(text) => {
                print!("{text}");
                std::io::stdout().flush()?;
                reply.push_str(&text);
            }
            AgentEvent::ToolRequested { name, input } => {
                println!("\n  [{}]", describe_tool(&name, &input));
            }
            AgentEvent::Completed(stats) => {
                println!(
                    "\n\n(turns: {}, cost: ${:.4}, took: {:.1}s{})",
                    stats.turns,
                    stats.cost_usd,
                    stats.duration.as_secs_f64(),
                    if stats.budget_exhausted {
                        ", budget exhausted"
                    } else {
                        ""
                    },
                );
            }
            AgentEvent::Failed { error } => {
                println!("\n\nerror: {error}");
            }
        }
    }

    Ok((session, reply))
}

async fn chat_loop(
    driver: Driver,
    session: Option<PathBuf>,
    follow_up: bool,
    base_dir: PathBuf,
) -> Result<()> {
    let mode = if follow_up {
        ChatMode::FollowUp
    } else {
        ChatMode::Research
    };

    let mut session = match session {
        Some(path) => Some(Arc::new(Session::open(&path)?)),
        None => None,
    };
    let mut history: Vec<ChatTurn> = Vec::new();

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" || message == "quit" {
            break;
        }

        let (used, reply) = stream_turn(
            &driver,
            ChatRequest {
                message: message.to_string(),
                history: history.clone(),
                mode,
                session: session.clone(),
                base_dir: base_dir.clone(),
            },
        )
        .await?;

        // later turns stay in the session the first turn created
        session = Some(used);
        history.push(ChatTurn::user(message));
        history.push(ChatTurn::assistant(reply));
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config_from(&cli);
    let driver = Driver::from_env(config)?;

    match cli.command {
        Command::Run { topic } => {
            let outcome = driver.run_research(&topic, &cli.base_dir).await?;

            println!("{}", outcome.reply);
            println!("\nsession: {}", outcome.root.display());
            println!(
                "turns: {}, cost: ${:.4}, took: {:.1}s",
                outcome.stats.turns,
                outcome.stats.cost_usd,
                outcome.stats.duration.as_secs_f64(),
            );

            if let Some(error) = outcome.error {
                eprintln!("run failed: {error}");
                std::process::exit(1);
            }
        }
        Command::Chat {
            session,
            follow_up,
        } => {
            chat_loop(driver, session, follow_up, cli.base_dir).await?;
        }
    }

    Ok(())
}
