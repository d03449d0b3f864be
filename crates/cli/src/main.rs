//! Cinder CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: initialize config, workspace, and job store
//! - `agent`: interactive chat or single-message mode
//! - `daemon`: run the cron scheduler and heartbeat until Ctrl-C
//! - `jobs`: manage scheduled jobs in the store
//! - `heartbeat`: run one heartbeat check now
//! - `status`: show configuration and job summary

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "cinder",
    about = "Cinder: a tool-using conversational agent with cron jobs and a heartbeat",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and workspace
    Onboard,

    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run scheduled jobs and the heartbeat until interrupted
    Daemon,

    /// Manage scheduled jobs
    Jobs {
        #[command(subcommand)]
        action: commands::jobs::JobsAction,
    },

    /// Run one heartbeat check
    Heartbeat {
        /// Call the agent even if HEARTBEAT.md has no tasks
        #[arg(long)]
        force: bool,
    },

    /// Show system status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agent { message } => commands::agent::run(message).await?,
        Commands::Daemon => commands::daemon::run().await?,
        Commands::Jobs { action } => commands::jobs::run(action).await?,
        Commands::Heartbeat { force } => commands::heartbeat::run(force).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
