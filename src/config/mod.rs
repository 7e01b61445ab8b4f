mod init;
mod schema;
mod validation;

pub use init::run_init;
pub use schema::{Config, LocalConfig, RemoteConfig, StoreConfig};
pub use validation::validate_config;

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::store::{GradeStore, LocalStore, RemoteStore};

/// Get the config directory path (~/.config/recitation-judge/)
pub fn get_config_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join("recitation-judge")
}

/// Get the default config file path (~/.config/recitation-judge/config.yaml)
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.yaml")
}

/// Get the default local store path (~/.config/recitation-judge/store.json)
pub fn get_default_store_path() -> PathBuf {
    get_config_dir().join("store.json")
}

/// Load configuration from a YAML file
///
/// # Arguments
///
/// * `path` - Optional path to config file. If None, uses the default path,
///   and a missing default file yields the default (local store) config.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given config file does not exist
/// - The config file cannot be read
/// - The YAML cannot be parsed
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let explicit = path.is_some();
    let config_path = path.unwrap_or_else(get_config_path);

    if !config_path.exists() {
        if explicit {
            anyhow::bail!("Config file not found at {}", config_path.display());
        }
        debug!(path = %config_path.display(), "no config file, using local store");
        return Ok(Config::default());
    }

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    parse_config(&config_content)
        .with_context(|| format!("Failed to parse config: invalid YAML in {}", config_path.display()))
}

fn parse_config(content: &str) -> Result<Config> {
    // An empty file parses as null.
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_saphyr::from_str(content)?;
    Ok(config)
}

/// Local store file for a config, resolving the default location.
pub fn local_store_path(local: &LocalConfig) -> PathBuf {
    local.path.clone().unwrap_or_else(get_default_store_path)
}

/// Open the store a validated config points at.
pub fn open_store(config: &Config) -> Result<Box<dyn GradeStore>> {
    match &config.store {
        StoreConfig::Remote(remote) => {
            let store = RemoteStore::new(&remote.url, remote.timeout_duration(), remote.retries)
                .context("Failed to set up remote store")?;
            debug!(url = %remote.url, retries = remote.retries, "using remote store");
            Ok(Box::new(store))
        }
        StoreConfig::Local(local) => {
            let path = local_store_path(local);
            let store = LocalStore::open(path.clone())
                .with_context(|| format!("Failed to open local store at {}", path.display()))?;
            Ok(Box::new(store))
        }
    }
}
