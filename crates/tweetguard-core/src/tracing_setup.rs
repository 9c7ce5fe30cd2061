use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable naming an optional DEBUG log file.
pub const LOG_FILE_ENV: &str = "TWEETGUARD_LOG_FILE";

pub fn init_tracing() -> Result<()> {
    init_tracing_with_default("info")
}

/// Install the stderr layer (filtered by `RUST_LOG`, else `default_filter`)
/// and, when `TWEETGUARD_LOG_FILE` is set, a DEBUG layer appending to that file.
pub fn init_tracing_with_default(default_filter: &str) -> Result<()> {
    let file_logging = std::env::var(LOG_FILE_ENV).ok();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    if let Some(log_path) = file_logging {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file: {}", log_path))?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        registry
            .with(file_layer)
            .try_init()
            .context("Tracing already initialized")?;
        eprintln!("File logging enabled: {}", log_path);
    } else {
        registry.try_init().context("Tracing already initialized")?;
    }
    Ok(())
}
