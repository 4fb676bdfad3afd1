//! Structured logging to stderr. Stdout carries the protocol and is never logged to.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable output
    Pretty,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `info` or `schoold=debug`.
    pub filter: String,
}

pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|e| {
        eprintln!(
            "Warning: invalid log filter {:?} ({}); using {}",
            config.filter, e, DEFAULT_FILTER
        );
        EnvFilter::new(DEFAULT_FILTER)
    });

    let registry = tracing_subscriber::registry();
    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_filter(env_filter);
            registry.with(layer).try_init()?;
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false)
                .with_filter(env_filter);
            registry.with(layer).try_init()?;
        }
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        format = ?config.format,
        filter = %config.filter,
        "logging initialized"
    );
    Ok(())
}
