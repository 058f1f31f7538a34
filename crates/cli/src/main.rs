//! PaperDesk CLI: the main entry point.
//!
//! Commands:
//! - `serve`    Run the credential-holding relay and static UI
//! - `chat`     Upload a paper, get the analysis, then discuss it
//! - `doctor`   Diagnose configuration, credentials and speech output
//! - `onboard`  Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "paperdesk",
    about = "PaperDesk: research paper analysis and discussion",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of ~/.paperdesk/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the built UI
        #[arg(long)]
        static_dir: Option<String>,
    },

    /// Analyze a PDF and discuss it interactively
    Chat {
        /// The paper to load
        pdf: PathBuf,

        /// Do not narrate replies
        #[arg(short, long)]
        quiet: bool,

        /// Ask these questions after the analysis and exit
        #[arg(short, long = "ask", value_name = "QUESTION")]
        ask: Vec<String>,
    },

    /// Diagnose system health
    Doctor,

    /// Write a default configuration file
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port, static_dir } => commands::serve::run(config_path, port, static_dir).await?,
        Commands::Chat { pdf, quiet, ask } => commands::chat::run(config_path, pdf, quiet, ask).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Onboard => commands::onboard::run(config_path).await?,
    }

    Ok(())
}
