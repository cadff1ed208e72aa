//! # tracehook-cli
//!
//! Command-line interface for tracehook.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tracehook_core::config::LoggingConfig;
use tracehook_core::Config;
use tracehook_session::FileSessionStore;

mod commands;

/// Application context containing shared state.
pub struct AppContext {
    pub config: Config,
}

impl AppContext {
    /// Session store at the configured trace root.
    pub fn store(&self) -> FileSessionStore {
        FileSessionStore::new(&self.config.trace.root)
    }
}

/// tracehook - session tracing for AI coding assistant hooks
#[derive(Parser)]
#[command(name = "tracehook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Trace root directory (overrides trace.root)
    #[arg(long, global = true, value_name = "PATH")]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an agent spawn from a tool-use hook payload on stdin
    Record {
        /// Session to record into (overrides the environment)
        #[arg(long, value_name = "SESSION_ID")]
        session: Option<String>,
    },
    /// Aggregate session metrics and print the digest
    Aggregate {
        /// Session to aggregate (defaults to the current session)
        #[arg(long, value_name = "SESSION_ID")]
        session: Option<String>,
        /// Do not print the digest
        #[arg(short, long)]
        quiet: bool,
    },
    /// Inspect recorded sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
    /// Diagnose installation issues
    Doctor,
}

#[derive(Subcommand)]
enum SessionAction {
    /// List recorded sessions, newest first
    List {
        /// Maximum sessions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show session details
    Show {
        /// Session ID or unique prefix
        id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show where configuration is read from
    Path,
}

/// Build the log filter: `-v` wins, then `RUST_LOG`, then the config level.
fn log_filter(verbose: bool, configured: &str) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
}

/// Validated configuration, or the defaults when loading or validation fails.
fn effective_config(loaded: Result<Config, tracehook_core::Error>) -> Config {
    match loaded.and_then(Config::ensure_valid) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default configuration: {}", e);
            Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let loaded = Config::load().map_err(|e| tracehook_core::Error::Config(e.to_string()));
    let level = match &loaded {
        Ok(config) if config.validate().is_ok() => config.logging.level.clone(),
        _ => LoggingConfig::default().level,
    };

    // Initialize logging; stdout is reserved for hook output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(cli.verbose, &level))
        .init();

    let mut config = effective_config(loaded);

    if let Some(root) = cli.root {
        config.trace.root = root;
    }

    let ctx = AppContext { config };

    match cli.command {
        Commands::Record { session } => {
            commands::hook::record(&ctx, session).await;
        }
        Commands::Aggregate { session, quiet } => {
            commands::hook::aggregate(&ctx, session, quiet).await;
        }
        Commands::Session { action } => {
            commands::session::handle(action, &ctx).await?;
        }
        Commands::Config { action } => {
            commands::config::handle(action, &ctx)?;
        }
        Commands::Version => {
            println!("tracehook {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Doctor => {
            commands::doctor::run(&ctx).await?;
        }
    }

    Ok(())
}
