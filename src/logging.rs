use anyhow::Context;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::shared::config::LoggingConfig;

/// Installs the stdout layer and, when `log_dir` is set, a daily-rolling
/// file layer. Each sink has its own level.
pub fn init(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let stdout_layer = fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .with_filter(parse_level(&cfg.stdout_level, "stdout_level")?);

    let file_layer = if cfg.log_dir.trim().is_empty() {
        None
    } else {
        let appender = tracing_appender::rolling::daily(&cfg.log_dir, &cfg.file_name);
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(appender)
                .with_filter(parse_level(&cfg.file_level, "file_level")?),
        )
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("global subscriber already installed")?;

    info!(log_dir = %cfg.log_dir, file = %cfg.file_name, "Logging initialized");
    Ok(())
}

/// Parses a level such as `info` or `off`, naming the offending key.
pub fn parse_level(raw: &str, key: &str) -> anyhow::Result<LevelFilter> {
    raw.trim()
        .parse::<LevelFilter>()
        .with_context(|| format!("invalid logging.{key}: '{raw}'"))
}

#[cfg(test)]
pub fn init_for_tests() {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("gridsync=debug".parse().unwrap());

        // Another test harness may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
#[path = "logging_test.rs"]
mod logging_test;
