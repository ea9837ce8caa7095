//! Application configuration for reportcast.
//!
//! User config lives at `~/.reportcast/reportcast.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials never live in the file — sections name the environment
//! variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReportcastError, Result};
use crate::window::DEFAULT_WINDOW_DAYS;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "reportcast.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".reportcast";

// ---------------------------------------------------------------------------
// Config structs (matching reportcast.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Knowledge-base ingestion endpoint settings.
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,

    /// Configured upstream sources, in report order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory for generated report files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Trailing window length in days.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            window_days: default_window_days(),
        }
    }
}

fn default_output_dir() -> String {
    "data_exports".into()
}
fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

/// `[knowledge_base]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Base URL of the KB instance (e.g. `https://kb.example.com`).
    #[serde(default)]
    pub base_url: String,

    /// Name of the env var holding the API key (never the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the target collection id.
    #[serde(default = "default_collection_id_env")]
    pub collection_id_env: String,

    /// Minimum ms between publish calls (one pause after every call).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-call HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key_env: default_api_key_env(),
            collection_id_env: default_collection_id_env(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "REPORTCAST_KB_API_KEY".into()
}
fn default_collection_id_env() -> String {
    "REPORTCAST_KB_COLLECTION_ID".into()
}
fn default_rate_limit() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[[sources]]` entry — one upstream data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Display name, used as the section title.
    pub name: String,

    /// Connector kind: `woocommerce`, `mailchimp`, or `clarity`.
    pub kind: String,

    /// Days this source's data lags behind real time.
    #[serde(default)]
    pub lag_days: u32,

    /// API endpoint / store URL, where the kind needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Env var holding the primary credential (API key / consumer key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_env: Option<String>,

    /// Env var holding the secondary credential (consumer secret).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,

    /// Local file path, for file-backed sources (clarity insights).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Resolved KB credentials pulled from the environment.
#[derive(Debug, Clone)]
pub struct KbCredentials {
    pub api_key: String,
    pub collection_id: String,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.reportcast/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ReportcastError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.reportcast/reportcast.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportcastError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ReportcastError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ReportcastError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ReportcastError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ReportcastError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the KB credentials, or fail with a config error when the
/// endpoint or either env var is absent. This is the fatal-config gate:
/// without these the run may still generate a local report but must not
/// attempt any publish call.
pub fn resolve_kb_credentials(config: &KnowledgeBaseConfig) -> Result<KbCredentials> {
    if config.base_url.trim().is_empty() {
        return Err(ReportcastError::config(
            "knowledge_base.base_url is not configured",
        ));
    }

    let api_key = read_env(&config.api_key_env)?;
    let collection_id = read_env(&config.collection_id_env)?;

    Ok(KbCredentials {
        api_key,
        collection_id,
    })
}

fn read_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ReportcastError::config(format!(
            "required environment variable {var_name} is not set"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("REPORTCAST_KB_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.window_days, 7);
        assert_eq!(parsed.knowledge_base.rate_limit_ms, 1000);
    }

    #[test]
    fn config_with_sources() {
        let toml_str = r#"
[defaults]
output_dir = "/tmp/reports"

[knowledge_base]
base_url = "https://kb.example.com"

[[sources]]
name = "WooCommerce Data"
kind = "woocommerce"
endpoint = "https://shop.example.com"
key_env = "WOO_CONSUMER_KEY"
secret_env = "WOO_CONSUMER_SECRET"

[[sources]]
name = "Search Console Data"
kind = "clarity"
lag_days = 2
path = "insights.txt"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "WooCommerce Data");
        assert_eq!(config.sources[0].lag_days, 0);
        assert_eq!(config.sources[1].lag_days, 2);
    }

    #[test]
    fn kb_credentials_require_base_url() {
        let kb = KnowledgeBaseConfig::default();
        let result = resolve_kb_credentials(&kb);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("base_url"));
    }

    #[test]
    fn kb_credentials_require_env_vars() {
        // Unique env var names to avoid interfering with other tests
        let kb = KnowledgeBaseConfig {
            base_url: "https://kb.example.com".into(),
            api_key_env: "RC_TEST_NONEXISTENT_KEY_9181".into(),
            ..Default::default()
        };
        let result = resolve_kb_credentials(&kb);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("RC_TEST_NONEXISTENT_KEY_9181")
        );
    }
}
