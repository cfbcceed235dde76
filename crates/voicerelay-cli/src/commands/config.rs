//! Configuration management commands.

use clap::Args;
use serde_json::Value;
use std::path::Path;
use voicerelay_core::config::Config;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

/// Config as JSON with the API key masked.
pub fn redacted(config: &Config) -> anyhow::Result<Value> {
    let mut json = serde_json::to_value(config)?;
    if let Some(key) = json.pointer_mut("/upstream/api_key") {
        if !key.is_null() {
            *key = Value::String("[REDACTED]".to_string());
        }
    }
    Ok(json)
}

/// Look up a dot-separated key.
pub fn get_path<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(json, |acc, k| acc.get(k))
}

/// Set a dot-separated key, creating intermediate objects as needed.
///
/// The value is parsed as JSON first (numbers, bools), falling back to a
/// plain string.
pub fn set_path(json: &mut Value, key: &str, value: &str) {
    let parsed: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            current[part] = parsed;
            return;
        }
        if !current.get(part).is_some_and(Value::is_object) {
            current[part] = serde_json::json!({});
        }
        current = &mut current[part];
    }
}

/// Run the config command.
pub async fn run(args: ConfigArgs, path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load_or_default_from(path);
            println!("{}", serde_json::to_string_pretty(&redacted(&config)?)?);
        }

        ConfigCommand::Get { key } => {
            let config = Config::load_or_default_from(path);
            let json = redacted(&config)?;

            match get_path(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Set { key, value } => {
            let config = Config::load_or_default_from(path);
            let mut json = serde_json::to_value(&config)?;
            set_path(&mut json, &key, &value);

            // Round-trip through Config so a bad shape is rejected before saving.
            let updated: Config = serde_json::from_value(json)
                .map_err(|e| anyhow::anyhow!("Invalid configuration after set: {}", e))?;
            updated.save(path)?;

            println!("Set {} = {}", key, value);
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }

            let config = Config::from_env_defaults();
            config.save(path)?;

            println!("Created config file: {:?}", path);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Validate => match Config::load(path) {
            Ok(config) => match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => anyhow::bail!("Configuration error: {}", e),
            },
            Err(e) => anyhow::bail!("Failed to load config: {}", e),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicerelay_core::config::LogLevel;
    use voicerelay_core::SecretString;

    #[test]
    fn test_dot_path_get() {
        let json = serde_json::to_value(Config::default()).unwrap();
        let value = get_path(&json, "gateway.port").unwrap();
        assert_eq!(value.as_u64(), Some(8080));
        assert!(get_path(&json, "gateway.nope").is_none());
    }

    #[test]
    fn test_dot_path_set() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        set_path(&mut json, "gateway.port", "9090");
        set_path(&mut json, "logging.level", "debug");
        set_path(&mut json, "webhook.url", "https://hooks.example.com/x");

        let updated: Config = serde_json::from_value(json).unwrap();
        assert_eq!(updated.gateway.port, 9090);
        assert_eq!(updated.logging.level, LogLevel::Debug);
        assert_eq!(
            updated.webhook.url.as_deref(),
            Some("https://hooks.example.com/x")
        );
    }

    #[test]
    fn test_invalid_set_is_rejected() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        set_path(&mut json, "gateway", "not-an-object");
        assert!(serde_json::from_value::<Config>(json).is_err());
    }

    #[test]
    fn test_show_masks_api_key() {
        let mut config = Config::default();
        config.upstream.api_key = Some(SecretString::new("sk-live-123"));
        let json = redacted(&config).unwrap();
        assert_eq!(json["upstream"]["api_key"], "[REDACTED]");
        assert!(!json.to_string().contains("sk-live-123"));

        let json = redacted(&Config::default()).unwrap();
        assert!(json["upstream"]["api_key"].is_null());
    }

    #[tokio::test]
    async fn test_init_set_validate_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voicerelay.json5");

        let init = ConfigArgs {
            command: ConfigCommand::Init { force: false },
        };
        run(init, &path).await.unwrap();
        assert!(path.exists());

        let again = ConfigArgs {
            command: ConfigCommand::Init { force: false },
        };
        assert!(run(again, &path).await.is_err());

        let set = ConfigArgs {
            command: ConfigCommand::Set {
                key: "gateway.port".to_string(),
                value: "9191".to_string(),
            },
        };
        run(set, &path).await.unwrap();
        assert_eq!(Config::load(&path).unwrap().gateway.port, 9191);

        let validate = ConfigArgs {
            command: ConfigCommand::Validate,
        };
        run(validate, &path).await.unwrap();
    }
}
