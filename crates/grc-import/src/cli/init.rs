use std::{fs, path::Path};

use grc_import_core::Config;
use tracing::instrument;

use crate::cli::{CONFIG_FILE, config_path, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Base URL of the persistence service
    #[arg(long, value_name = "URL")]
    store_url: Option<String>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let path = config_path(root);
        if path.exists() {
            anyhow::bail!("Already initialized (found existing {CONFIG_FILE})");
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", dir.display()))?;
        }

        let mut config = Config::default();
        if let Some(url) = &self.store_url {
            config
                .set("store_url", url)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        config
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to create {CONFIG_FILE}: {e}"))?;

        println!("{}", format!("Initialized {}", root.display()).success());
        println!("  Created: {CONFIG_FILE}");

        println!();
        println!("Next steps:");
        if self.store_url.is_none() {
            println!("  grc-import config set store_url https://<project>.example.com");
        }
        println!(
            "  export {}=<api key>",
            config.store_key_env()
        );
        println!("  grc-import preview requirements.csv");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use grc_import_core::Config;

    use super::Command;
    use crate::cli::config_path;

    #[test]
    fn writes_default_config_with_store_url() {
        let root = tempfile::tempdir().unwrap();

        Command {
            store_url: Some("https://grc.example.com".to_string()),
        }
        .run(root.path())
        .unwrap();

        let config = Config::load(&config_path(root.path())).unwrap();
        assert_eq!(config.store_url(), Some("https://grc.example.com"));
    }

    #[test]
    fn refuses_to_overwrite() {
        let root = tempfile::tempdir().unwrap();
        Command { store_url: None }.run(root.path()).unwrap();

        let error = Command { store_url: None }.run(root.path()).unwrap_err();

        assert!(error.to_string().contains("Already initialized"));
    }
}
