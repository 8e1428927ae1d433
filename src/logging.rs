use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Levels accepted by `--log-level`.
pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Filter directives for a level: our crate at `level`, dependencies quieter.
pub fn filter_directives(level: &str) -> String {
    format!("warn,meal_optim={}", level)
}

/// Installs the global subscriber: human-readable events on stderr, plus a
/// plain-text copy appended to `log_file` when given. `RUST_LOG` overrides
/// `level` when set.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(level)))
        .context("Invalid log filter")?;

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")
}
