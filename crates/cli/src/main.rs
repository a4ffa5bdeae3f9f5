//! TreeShell CLI — the main entry point.
//!
//! Commands:
//! - `repl`    — Interactive navigation and chained execution
//! - `run`     — Execute lines non-interactively in one session
//! - `tree`    — Print the address space
//! - `config`  — Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "treeshell",
    about = "TreeShell — navigate a tree of actions and chain them in one line",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.treeshell/config.toml)
    #[arg(short, long, global = true, env = "TREESHELL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Repl,

    /// Execute lines in order within one session
    Run {
        /// Lines such as `jump 0.5.1 {"tool_name":"bash_tool",...}`
        #[arg(required = true)]
        lines: Vec<String>,
    },

    /// Print the address space
    Tree,

    /// Show the effective configuration (API key redacted)
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        defaults: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON results.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Repl => commands::repl::run(&config).await?,
        Commands::Run { lines } => {
            if !commands::run::run(&config, &lines).await? {
                std::process::exit(1);
            }
        }
        Commands::Tree => commands::tree::run(&config)?,
        Commands::Config { defaults } => commands::config_cmd::run(&config, cli.config.as_deref(), defaults),
    }

    Ok(())
}
