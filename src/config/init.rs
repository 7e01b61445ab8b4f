use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use super::schema::{DEFAULT_RETRIES, DEFAULT_TIMEOUT};
use super::{get_config_path, get_default_store_path, validate_config};
use super::{Config, LocalConfig, RemoteConfig, StoreConfig};

/// Prompt user with a message and return their trimmed input.
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout()
        .flush()
        .context("Failed to flush stdout")?;
    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read input")?;
    Ok(input.trim().to_string())
}

/// Prompt user with a message and a default value. Returns default if input is empty.
fn prompt_with_default(message: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}]: ", message, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

/// Prompt user with a yes/no question. Returns bool based on input and default.
fn prompt_yes_no(message: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "Y/n" } else { "y/N" };
    let input = prompt(&format!("{} [{}]: ", message, hint))?;
    Ok(parse_yes_no(&input, default_yes))
}

fn parse_yes_no(input: &str, default_yes: bool) -> bool {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        default_yes
    } else {
        input == "y" || input == "yes"
    }
}

/// Check a web app URL the same way config validation does.
fn validate_url(s: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(s).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

fn validate_timeout(s: &str) -> Result<(), String> {
    match humantime::parse_duration(s) {
        Ok(d) if d == Duration::ZERO => Err("must be greater than zero".to_string()),
        Ok(_) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

fn prompt_remote() -> Result<RemoteConfig> {
    let url = loop {
        let url = prompt("Web app URL: ")?;
        match validate_url(&url) {
            Ok(()) => break url,
            Err(e) => println!("  Invalid URL: {}", e),
        }
    };

    let timeout = loop {
        let timeout = prompt_with_default("Request timeout", DEFAULT_TIMEOUT)?;
        match validate_timeout(&timeout) {
            Ok(()) => break timeout,
            Err(e) => println!("  Invalid timeout: {}. Examples: 10s, 1m", e),
        }
    };

    let retries = loop {
        let retries = prompt_with_default("Read attempts", &DEFAULT_RETRIES.to_string())?;
        match retries.parse::<usize>() {
            Ok(n) if n >= 1 => break n,
            _ => println!("  Enter a whole number of at least 1."),
        }
    };

    Ok(RemoteConfig {
        url,
        timeout,
        retries,
    })
}

fn prompt_local() -> Result<LocalConfig> {
    let default_store = get_default_store_path();
    let path = prompt_with_default(
        "Where should grades be stored?",
        &default_store.display().to_string(),
    )?;
    let path = PathBuf::from(path);

    Ok(LocalConfig {
        path: (path != default_store).then_some(path),
    })
}

/// Interactively write a config file.
pub fn run_init(default_path: Option<PathBuf>) -> Result<()> {
    println!("Recitation judge setup");
    println!();

    // 1. Store
    let use_remote = prompt_yes_no("Connect to the competition web app?", true)?;
    let store = if use_remote {
        StoreConfig::Remote(prompt_remote()?)
    } else {
        StoreConfig::Local(prompt_local()?)
    };

    let config = Config {
        store,
        log_level: None,
    };
    if let Err(errors) = validate_config(&config) {
        anyhow::bail!("Config is invalid:\n  {}", errors.join("\n  "));
    }

    // 2. Config path
    let default_config_path = default_path.unwrap_or_else(get_config_path);
    println!();
    let path_str = prompt_with_default(
        "Where should the config be saved?",
        &default_config_path.display().to_string(),
    )?;
    let config_path = PathBuf::from(&path_str);

    if config_path.exists() {
        let overwrite = prompt_yes_no(
            &format!(
                "Config already exists at {}. Overwrite?",
                config_path.display()
            ),
            false,
        )?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    // 3. Write config
    let yaml = serde_saphyr::to_string(&config)
        .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    std::fs::write(&config_path, &yaml)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!();
    println!("Config written to {}", config_path.display());
    println!("Run `recitation-judge committees` to check the connection.");

    Ok(())
}
