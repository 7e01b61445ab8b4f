use std::time::Duration;

use super::schema::{Config, StoreConfig};

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace", "off"];

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    match &config.store {
        StoreConfig::Remote(remote) => {
            match reqwest::Url::parse(remote.url.trim()) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => errors.push(format!(
                    "store.remote.url: unsupported scheme '{}' (expected http or https)",
                    url.scheme()
                )),
                Err(e) => errors.push(format!("store.remote.url: invalid '{}' - {}", remote.url, e)),
            }

            match humantime::parse_duration(remote.timeout.trim()) {
                Ok(d) if d == Duration::ZERO => {
                    errors.push("store.remote.timeout: must be greater than zero".to_string())
                }
                Ok(_) => {}
                Err(e) => errors.push(format!(
                    "store.remote.timeout: invalid '{}' - {}",
                    remote.timeout, e
                )),
            }

            if remote.retries == 0 {
                errors.push("store.remote.retries: must be at least 1".to_string());
            }
        }
        StoreConfig::Local(local) => {
            if let Some(path) = &local.path {
                if path.as_os_str().is_empty() {
                    errors.push("store.local.path: must not be empty".to_string());
                }
            }
        }
    }

    if let Some(level) = &config.log_level {
        if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) {
            errors.push(format!(
                "log_level: unknown level '{}' (expected one of {})",
                level,
                LOG_LEVELS.join(", ")
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
