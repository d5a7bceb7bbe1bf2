use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub subscriptions: SubscriptionsConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

/// Where the player plugin listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
    /// Timeout for ordinary calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for long-poll subscriptions.  0 waits for the push indefinitely.
    #[serde(default)]
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionsConfig {
    /// Fixed pause before re-subscribing after a failed long poll.
    #[serde(default = "default_resubscribe_delay_ms")]
    pub resubscribe_delay_ms: u64,
}

/// Display preferences.  Read-only input to the client core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Entry fields shown in playlist views (`id` is always fetched first).
    #[serde(default = "default_entry_fields")]
    pub entry_fields: Vec<String>,
    /// Format string for the now-playing title.
    #[serde(default = "default_title_format")]
    pub title_format: String,
    #[serde(default = "default_page_length")]
    pub page_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            rpc_path: default_rpc_path(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_timeout_secs: 0,
        }
    }
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            resubscribe_delay_ms: default_resubscribe_delay_ms(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            entry_fields: default_entry_fields(),
            title_format: default_title_format(),
            page_length: default_page_length(),
        }
    }
}

fn default_url() -> String {
    "http://127.0.0.1:3333".to_string()
}

fn default_rpc_path() -> String {
    "/RPC_JSON".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_resubscribe_delay_ms() -> u64 {
    1000
}

fn default_entry_fields() -> Vec<String> {
    vec!["title".to_string()]
}

fn default_title_format() -> String {
    "%a - %T".to_string()
}

fn default_page_length() -> usize {
    25
}

impl ServerConfig {
    /// Full URL of the JSON-RPC endpoint.
    pub fn rpc_url(&self) -> String {
        join_url(&self.url, &self.rpc_path)
    }

    /// Absolute URL for a server-relative path such as a download link.
    pub fn resolve(&self, path: &str) -> String {
        join_url(&self.url, path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        (self.poll_timeout_secs > 0).then(|| Duration::from_secs(self.poll_timeout_secs))
    }
}

impl SubscriptionsConfig {
    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl Config {
    /// Loads the default config file, writing defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            tracing::info!("config: writing defaults to {}", config_path.display());
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
