//! Gateway command.

use clap::{Args, ValueEnum};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use voicerelay_core::config::{BindMode, Config};
use voicerelay_gateway::Gateway;

/// Gateway command arguments.
#[derive(Args)]
pub struct GatewayArgs {
    #[command(subcommand)]
    pub command: GatewayCommand,
}

/// Bind mode override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BindArg {
    Loopback,
    Lan,
}

impl From<BindArg> for BindMode {
    fn from(arg: BindArg) -> Self {
        match arg {
            BindArg::Loopback => BindMode::Loopback,
            BindArg::Lan => BindMode::Lan,
        }
    }
}

#[derive(clap::Subcommand)]
pub enum GatewayCommand {
    /// Start the gateway server
    Run {
        /// Bind mode (overrides config)
        #[arg(short, long, value_enum)]
        bind: Option<BindArg>,

        /// Port number (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show gateway status
    Status,
}

/// Apply command-line overrides to the loaded configuration.
pub fn apply_overrides(config: &mut Config, bind: Option<BindArg>, port: Option<u16>) {
    if let Some(bind) = bind {
        config.gateway.bind = bind.into();
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
}

/// Run the gateway command.
pub async fn run(args: GatewayArgs, config_path: &Path) -> anyhow::Result<()> {
    let mut config = Config::load_or_default_from(config_path);

    match args.command {
        GatewayCommand::Run { bind, port } => {
            apply_overrides(&mut config, bind, port);
            config.validate()?;

            if config.upstream_api_key().is_none() {
                info!("No upstream API key configured; start_session will be rejected upstream");
            }

            let gateway = Gateway::new(config);
            gateway.run().await?;
        }

        GatewayCommand::Status => {
            let url = format!("http://127.0.0.1:{}/health", config.gateway.port);
            let client = reqwest::Client::new();

            match client.get(&url).timeout(Duration::from_secs(2)).send().await {
                Ok(response) => {
                    let health: serde_json::Value = response.json().await?;
                    println!(
                        "Gateway is running on port {} ({} active sessions)",
                        config.gateway.port,
                        health["sessions"].as_u64().unwrap_or(0)
                    );
                }
                Err(_) => {
                    println!("Gateway is not running.");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = Config::default();
        apply_overrides(&mut config, Some(BindArg::Lan), Some(9443));
        assert_eq!(config.gateway.bind, BindMode::Lan);
        assert_eq!(config.gateway.port, 9443);
    }

    #[test]
    fn test_no_overrides_keep_config_values() {
        let mut config = Config::default();
        config.gateway.port = 7000;
        apply_overrides(&mut config, None, None);
        assert_eq!(config.gateway.bind, BindMode::Loopback);
        assert_eq!(config.gateway.port, 7000);
    }
}
