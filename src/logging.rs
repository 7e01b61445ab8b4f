use tracing_subscriber::EnvFilter;

/// Filter directive for the configured level, raised to `debug` by `--verbose`.
pub fn filter_directive(config_level: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config_level.trim().to_lowercase()
    }
}

/// Install the stderr subscriber. `RUST_LOG`, when set, wins over both the
/// config level and `--verbose`.
pub fn init(config_level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config_level, verbose)));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
