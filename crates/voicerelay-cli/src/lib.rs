//! voicerelay command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use voicerelay_core::config::{Config, LogLevel};
use voicerelay_core::paths;

/// voicerelay - browser to realtime speech service relay
#[derive(Parser)]
#[command(name = "voicerelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "VOICERELAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run or inspect the gateway server
    Gateway(commands::gateway::GatewayArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Connect to a running gateway and print what it sends
    Client(commands::client::ClientArgs),

    /// Show version information
    Version,
}

impl Cli {
    /// Config file path: `--config`, else the default location.
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(paths::config_file()?),
        }
    }

    /// Load the config file, or defaults when it does not exist.
    pub fn load_config(&self) -> Config {
        match self.config_path() {
            Ok(path) => Config::load_or_default_from(&path),
            Err(_) => Config::from_env_defaults(),
        }
    }
}

/// Filter directive for the given verbosity and configured level.
pub fn filter_directive(verbose: u8, level: LogLevel) -> String {
    let level = match verbose {
        0 => level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    format!("voicerelay={}", level)
}

/// Install the global tracing subscriber. `RUST_LOG` wins when set.
pub fn init_tracing(cli: &Cli) {
    let logging = cli.load_config().logging;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter_directive(cli.verbose, logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path()?;
    match cli.command {
        Commands::Gateway(args) => commands::gateway::run(args, &config_path).await,
        Commands::Config(args) => commands::config::run(args, &config_path).await,
        Commands::Client(args) => commands::client::run(args).await,
        Commands::Version => {
            println!("voicerelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
