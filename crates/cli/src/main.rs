//! Kubrick CLI: the main entry point.
//!
//! Commands:
//! - `agent`: Interactive session or a single task
//! - `doctor`: Diagnose configuration and provider health
//! - `config`: Show, locate or initialise the config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "kubrick",
    about = "Kubrick: an agentic coding assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Work on tasks with the agent
    Agent {
        /// Run a single task instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Directory the tools operate in (defaults to the current directory)
        #[arg(short = 'd', long, env = "KUBRICK_WORKING_DIR")]
        working_dir: Option<PathBuf>,

        /// Approve file changes and commands without asking, and skip plan review
        #[arg(short, long)]
        yes: bool,
    },

    /// Diagnose configuration and provider health
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed answers on stdout stay clean
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Agent {
            message,
            working_dir,
            yes,
        } => commands::agent::run(message, working_dir, yes).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
        },
    }

    Ok(())
}
