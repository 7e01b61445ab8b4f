use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: &str = "15s";
pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

/// Where contestants, committees and grades live.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    /// The competition's spreadsheet web app.
    Remote(RemoteConfig),
    /// A JSON file on this machine.
    Local(LocalConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local(LocalConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl RemoteConfig {
    /// Request timeout; falls back to the default when the value does not parse.
    pub fn timeout_duration(&self) -> Duration {
        humantime::parse_duration(self.timeout.trim())
            .or_else(|_| humantime::parse_duration(DEFAULT_TIMEOUT))
            .unwrap_or(Duration::from_secs(15))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LocalConfig {
    /// Store file; defaults to `~/.config/recitation-judge/store.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

fn default_retries() -> usize {
    DEFAULT_RETRIES
}
