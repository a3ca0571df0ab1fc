use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Result, SessionError};

/// Parse level string -> LevelFilter
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(SessionError::Config(format!(
            "Invalid logging.level '{}'. Valid values: trace, debug, info, warn, error",
            other
        ))),
    }
}

/// Installs the global tracing subscriber. Safe to call more than once; later
/// calls leave the first subscriber in place.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<()> {
    let level_filter = parse_level(&logging_config.level)?;

    // RUST_LOG directives still apply on top of the configured level.
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    let installed = match logging_config.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter_layer)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            )
            .try_init(),
        // Fallback to console if unknown
        _ => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(
            service_name = logging_config.service_name.as_str(),
            service_version = logging_config.service_version.as_str(),
            format = logging_config.format.as_str(),
            "logging initialised"
        );
    }
    Ok(())
}
