use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::domain::Strictness;

/// Configuration for compliance imports.
///
/// Stored as TOML (conventionally at `.grc/config.toml`), through a versioned
/// serialization format so the on-disk layout can change without breaking
/// existing files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Base URL of the table-oriented persistence service.
    store_url: Option<String>,

    /// Environment variable holding the persistence service API key.
    store_key_env: String,

    /// Base URL of the text-extraction proxy. The target URL is appended to
    /// it verbatim.
    reader_proxy_url: String,

    /// Upper bound for each fetch attempt, in seconds.
    fetch_timeout_secs: u64,

    /// Maximum number of results returned by a linking search.
    search_limit: usize,

    /// Shortest query a linking search will run.
    min_query_len: usize,

    /// Shortest pasted text accepted as an import source.
    min_paste_len: usize,

    /// Strictness of the CSV/JSON bulk importer.
    bulk_strictness: Strictness,

    /// Strictness of the rich-format importer.
    rich_strictness: Strictness,

    /// Placeholder values for risks created during review.
    pub risk_defaults: RiskDefaults,

    /// Placeholder values for controls created during review.
    pub control_defaults: ControlDefaults,
}

/// Placeholder values for a risk created on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskDefaults {
    /// Risk category.
    pub category: String,
    /// Inherent risk level.
    pub level: String,
    /// Workflow status.
    pub status: String,
}

impl Default for RiskDefaults {
    fn default() -> Self {
        Self {
            category: "Compliance".to_string(),
            level: "medium".to_string(),
            status: "identified".to_string(),
        }
    }
}

/// Placeholder values for a control created on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlDefaults {
    /// Control type.
    pub control_type: String,
    /// Execution frequency.
    pub frequency: String,
    /// Owning process area.
    pub process_area: String,
    /// Name of the control set new controls are filed under.
    pub control_set: String,
}

impl Default for ControlDefaults {
    fn default() -> Self {
        Self {
            control_type: "preventive".to_string(),
            frequency: "continuous".to_string(),
            process_area: "General".to_string(),
            control_set: "Imported Controls".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: None,
            store_key_env: default_store_key_env(),
            reader_proxy_url: default_reader_proxy_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            search_limit: default_search_limit(),
            min_query_len: default_min_query_len(),
            min_paste_len: default_min_paste_len(),
            bulk_strictness: Strictness::AllOrNothing,
            rich_strictness: Strictness::BestEffort,
            risk_defaults: RiskDefaults::default(),
            control_defaults: ControlDefaults::default(),
        }
    }
}

/// Keys accepted by [`Config::get`] and [`Config::set`].
pub const KEYS: &[&str] = &[
    "store_url",
    "store_key_env",
    "reader_proxy_url",
    "fetch_timeout_secs",
    "search_limit",
    "min_query_len",
    "min_paste_len",
    "bulk_strictness",
    "rich_strictness",
];

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads the configuration, falling back to defaults if the file is
    /// missing or unreadable.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::debug!("Failed to load config: {e}");
            Self::default()
        })
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Base URL of the persistence service, if configured.
    #[must_use]
    pub fn store_url(&self) -> Option<&str> {
        self.store_url.as_deref()
    }

    /// Environment variable holding the persistence service API key.
    #[must_use]
    pub fn store_key_env(&self) -> &str {
        &self.store_key_env
    }

    /// Base URL of the text-extraction proxy.
    #[must_use]
    pub fn reader_proxy_url(&self) -> &str {
        &self.reader_proxy_url
    }

    /// Upper bound for each fetch attempt.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Maximum number of results returned by a linking search.
    #[must_use]
    pub const fn search_limit(&self) -> usize {
        self.search_limit
    }

    /// Shortest query a linking search will run.
    #[must_use]
    pub const fn min_query_len(&self) -> usize {
        self.min_query_len
    }

    /// Shortest pasted text accepted as an import source.
    #[must_use]
    pub const fn min_paste_len(&self) -> usize {
        self.min_paste_len
    }

    /// Strictness of the CSV/JSON bulk importer.
    #[must_use]
    pub const fn bulk_strictness(&self) -> Strictness {
        self.bulk_strictness
    }

    /// Strictness of the rich-format importer.
    #[must_use]
    pub const fn rich_strictness(&self) -> Strictness {
        self.rich_strictness
    }

    /// Returns the value of a configuration key as a string.
    ///
    /// Returns `None` for unknown keys and for `store_url` when unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "store_url" => self.store_url.clone(),
            "store_key_env" => Some(self.store_key_env.clone()),
            "reader_proxy_url" => Some(self.reader_proxy_url.clone()),
            "fetch_timeout_secs" => Some(self.fetch_timeout_secs.to_string()),
            "search_limit" => Some(self.search_limit.to_string()),
            "min_query_len" => Some(self.min_query_len.to_string()),
            "min_paste_len" => Some(self.min_paste_len.to_string()),
            "bulk_strictness" => Some(self.bulk_strictness.to_string()),
            "rich_strictness" => Some(self.rich_strictness.to_string()),
            _ => None,
        }
    }

    /// Sets a configuration key from its string form.
    ///
    /// An empty value clears `store_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
            value
                .trim()
                .parse()
                .map_err(|_| format!("Invalid value for {key}: '{value}' is not a number"))
        }

        match key {
            "store_url" => {
                let value = value.trim();
                self.store_url = (!value.is_empty()).then(|| value.to_string());
            }
            "store_key_env" => value.trim().clone_into(&mut self.store_key_env),
            "reader_proxy_url" => value.trim().clone_into(&mut self.reader_proxy_url),
            "fetch_timeout_secs" => self.fetch_timeout_secs = number(key, value)?,
            "search_limit" => self.search_limit = number(key, value)?,
            "min_query_len" => self.min_query_len = number(key, value)?,
            "min_paste_len" => self.min_paste_len = number(key, value)?,
            "bulk_strictness" => self.bulk_strictness = value.parse()?,
            "rich_strictness" => self.rich_strictness = value.parse()?,
            _ => {
                return Err(format!(
                    "Unknown configuration key '{key}'. Available keys: {}",
                    KEYS.join(", ")
                ));
            }
        }
        Ok(())
    }
}

fn default_store_key_env() -> String {
    "GRC_STORE_KEY".to_string()
}

fn default_reader_proxy_url() -> String {
    "https://r.jina.ai/".to_string()
}

const fn default_fetch_timeout_secs() -> u64 {
    15
}

const fn default_search_limit() -> usize {
    20
}

const fn default_min_query_len() -> usize {
    2
}

const fn default_min_paste_len() -> usize {
    20
}

const fn default_bulk_strictness() -> Strictness {
    Strictness::AllOrNothing
}

const fn default_rich_strictness() -> Strictness {
    Strictness::BestEffort
}

/// The serialized versions of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_url: Option<String>,

        #[serde(default = "default_store_key_env")]
        store_key_env: String,

        #[serde(default = "default_reader_proxy_url")]
        reader_proxy_url: String,

        #[serde(default = "default_fetch_timeout_secs")]
        fetch_timeout_secs: u64,

        #[serde(default = "default_search_limit")]
        search_limit: usize,

        #[serde(default = "default_min_query_len")]
        min_query_len: usize,

        #[serde(default = "default_min_paste_len")]
        min_paste_len: usize,

        #[serde(default = "default_bulk_strictness")]
        bulk_strictness: Strictness,

        #[serde(default = "default_rich_strictness")]
        rich_strictness: Strictness,

        #[serde(default)]
        risk_defaults: RiskDefaults,

        #[serde(default)]
        control_defaults: ControlDefaults,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                store_url,
                store_key_env,
                reader_proxy_url,
                fetch_timeout_secs,
                search_limit,
                min_query_len,
                min_paste_len,
                bulk_strictness,
                rich_strictness,
                risk_defaults,
                control_defaults,
            } => Self {
                store_url,
                store_key_env,
                reader_proxy_url,
                fetch_timeout_secs,
                search_limit,
                min_query_len,
                min_paste_len,
                bulk_strictness,
                rich_strictness,
                risk_defaults,
                control_defaults,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            store_url: config.store_url,
            store_key_env: config.store_key_env,
            reader_proxy_url: config.reader_proxy_url,
            fetch_timeout_secs: config.fetch_timeout_secs,
            search_limit: config.search_limit,
            min_query_len: config.min_query_len,
            min_paste_len: config.min_paste_len,
            bulk_strictness: config.bulk_strictness,
            rich_strictness: config.rich_strictness,
            risk_defaults: config.risk_defaults,
            control_defaults: config.control_defaults,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nstore_url = \"https://db.example.com\"\nfetch_timeout_secs = \
              30\nbulk_strictness = \"best-effort\"\n\n[control_defaults]\ncontrol_set = \
              \"ISO\"\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.store_url(), Some("https://db.example.com"));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.bulk_strictness(), Strictness::BestEffort);
        assert_eq!(config.rich_strictness(), Strictness::BestEffort);
        assert_eq!(config.control_defaults.control_set, "ISO");
        assert_eq!(config.control_defaults.frequency, "continuous");
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nsearch_limit = \"twenty\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let mut config = Config::default();
        config.set("store_url", "https://db.example.com").unwrap();
        config.set("min_paste_len", "40").unwrap();

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_number() {
        let mut config = Config::default();
        assert!(config.set("colour", "red").unwrap_err().contains("Unknown"));
        assert!(config.set("search_limit", "many").unwrap_err().contains("not a number"));
    }

    #[test]
    fn set_empty_store_url_clears_it() {
        let mut config = Config::default();
        config.set("store_url", "https://db.example.com").unwrap();
        config.set("store_url", " ").unwrap();
        assert_eq!(config.get("store_url"), None);
    }
}
