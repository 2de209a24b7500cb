//! flowdeck CLI, the main entry point.
//!
//! Commands:
//! - `serve`  : Start the HTTP server with every flow
//! - `run`    : Run a single flow and print its result
//! - `flows`  : List registered flows
//! - `config` : Show, locate or initialise the config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "flowdeck",
    about = "flowdeck: Gemini flow demos behind one HTTP server",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.flowdeck/config.toml
    #[arg(short, long, global = true, env = "FLOWDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Run one flow locally
    Run {
        /// Flow name, e.g. storyWriterFlow
        flow: String,

        /// Flow input as JSON; text that is not JSON is sent as a string
        #[arg(short, long)]
        input: Option<String>,

        /// Print streamed chunks as they arrive
        #[arg(short, long)]
        stream: bool,
    },

    /// List registered flows
    Flows,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
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
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(config_path, port, host).await?,
        Commands::Run {
            flow,
            input,
            stream,
        } => commands::run::run(config_path, &flow, input.as_deref(), stream).await?,
        Commands::Flows => commands::flows::run(config_path)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force)?,
        },
    }

    Ok(())
}
