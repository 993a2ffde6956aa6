use std::path::Path;

use grc_import_core::{CONFIG_KEYS, Config};
use tracing::instrument;

use crate::cli::{config_path, terminal::Colorize};

#[derive(Debug, clap::Parser)]
/// Show or modify importer configuration
///
/// Configuration is stored in .grc/config.toml.
///
/// Available configuration keys:
///   `store_url`           Base URL of the persistence service
///   `store_key_env`       Environment variable holding the API key
///   `reader_proxy_url`    Text-extraction proxy for web pages
///   `fetch_timeout_secs`  Timeout of each fetch attempt (default: 15)
///   `search_limit`        Maximum link search results (default: 20)
///   `min_query_len`       Shortest link search query (default: 2)
///   `min_paste_len`       Shortest accepted pasted text (default: 20)
///   `bulk_strictness`     all-or-nothing | best-effort (default: all-or-nothing)
///   `rich_strictness`     all-or-nothing | best-effort (default: best-effort)
pub struct Command {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, clap::Parser)]
enum ConfigCommand {
    /// Show all configuration values
    Show,

    /// Get a specific configuration value
    Get {
        /// Configuration key to retrieve
        key: String,
    },

    /// Set a configuration value
    ///
    /// Examples:
    ///   grc-import config set `store_url` <https://grc.example.com>
    ///   grc-import config set `bulk_strictness` best-effort
    Set {
        /// Configuration key to set
        key: String,

        /// Value to set; an empty value clears `store_url`
        value: String,
    },
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let path = config_path(root);

        match self.command {
            ConfigCommand::Show => {
                Self::show_config(&Self::load(&path)?);
                Ok(())
            }
            ConfigCommand::Get { key } => {
                let config = Self::load(&path)?;
                let value = config.get(&key).ok_or_else(|| unknown_key(&key))?;
                println!("{value}");
                Ok(())
            }
            ConfigCommand::Set { key, value } => Self::set_config(&path, &key, &value),
        }
    }

    fn load(path: &Path) -> anyhow::Result<Config> {
        if path.exists() {
            Config::load(path).map_err(|e| anyhow::anyhow!("{e}"))
        } else {
            Ok(Config::default())
        }
    }

    fn show_config(config: &Config) {
        println!("Configuration:");
        for key in CONFIG_KEYS {
            match config.get(key) {
                Some(value) => println!("  {key}: {value}"),
                None => println!("  {key}: {}", "(unset)".dim()),
            }
        }

        let risk = &config.risk_defaults;
        println!(
            "  risk_defaults: {}",
            format!("{} / {} / {}", risk.category, risk.level, risk.status).dim()
        );
        let control = &config.control_defaults;
        println!(
            "  control_defaults: {}",
            format!(
                "{} / {} / {} in '{}'",
                control.control_type, control.frequency, control.process_area, control.control_set
            )
            .dim()
        );
    }

    fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
        let mut config = Self::load(path)?;
        config.set(key, value).map_err(|e| anyhow::anyhow!("{e}"))?;
        config
            .save(path)
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        let shown = config
            .get(key)
            .unwrap_or_else(|| "(unset)".to_string());
        println!("{}", format!("{key} = {shown}").success());
        Ok(())
    }
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Unknown configuration key: '{key}'\n\nAvailable keys:\n  {}",
        CONFIG_KEYS.join("\n  ")
    )
}
