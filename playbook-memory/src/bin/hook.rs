//! Playbook hook
//!
//! Entry point invoked by the assistant host on lifecycle events. Reads the
//! event payload from stdin; only the prompt-submit hook writes to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playbook_memory::{
    config::{Config, ExtractorConfig},
    hooks::{HookInput, Hooks},
    reflection::ReflectiveExtractor,
};

#[derive(Debug, Parser)]
#[command(name = "playbook-hook", about = "Maintain and inject the project playbook")]
struct Cli {
    /// Project directory; defaults to the hook payload's cwd, then the working directory
    #[arg(long, env = "CLAUDE_PROJECT_DIR", global = true)]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inject the playbook on the first prompt of a session
    UserPromptSubmit,
    /// Reflect on the finished session and update the playbook
    SessionEnd,
    /// Reflect before the conversation is compacted
    PreCompact,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr; stdout carries the hook response
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let code = exit_code(run(cli).await);
    if code != 0 {
        std::process::exit(code);
    }
}

/// Log a failed run once and map it to the process exit status
fn exit_code(result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("playbook hook failed: {:#}", e);
            1
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut raw = String::new();
    tokio::io::stdin().read_to_string(&mut raw).await?;
    let input = HookInput::parse(&raw);

    let project_dir = match cli.project_dir.clone().or_else(|| input.cwd.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = Config::for_project(project_dir);
    tracing::debug!("Project directory: {:?}", config.project_dir);

    let extractor = ReflectiveExtractor::from_config(&ExtractorConfig::from_env())?;
    let hooks = Hooks::new(&config, extractor);

    match cli.command {
        Command::UserPromptSubmit => {
            let output = hooks.user_prompt_submit(&input)?;
            println!("{}", output.to_json());
        }
        Command::SessionEnd => {
            hooks.session_end(&input).await?;
        }
        Command::PreCompact => {
            hooks.pre_compact(&input).await?;
        }
    }

    Ok(())
}
