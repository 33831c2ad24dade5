use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Installs the global subscriber: console plus a daily-rotated file under
/// `<data_dir>/logs/`. `RUST_LOG` overrides the config-derived filter.
pub fn init(config: &Config) -> Result<()> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let file_appender = tracing_appender::rolling::daily(&log_dir, "sabia.log");

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::debug!(log_dir = %log_dir.display(), "logging initialised");
    Ok(())
}

fn default_directive(config: &Config) -> String {
    let level = if config.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    format!("sabia={level}")
}
