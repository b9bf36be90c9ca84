//! Logging and tracing initialization.
//!
//! Installs a `tracing_subscriber` registry configured from [`LoggingConfig`].
//! `RUST_LOG` takes precedence over the configured level when set.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{constants, ProtocolError, Result};

/// Install the global subscriber.
///
/// Fails with [`ProtocolError::ConfigError`] if a subscriber is already set;
/// it never panics.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(std::io::stdout().is_terminal()),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_ansi(std::io::stdout().is_terminal()),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init(),
    };

    result.map_err(|e| ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_LOGGING_INIT)))?;

    tracing::info!(
        app = %config.app_name,
        level = %config.log_level,
        format = ?config.format,
        "Logging initialized"
    );
    Ok(())
}

/// Filter from `RUST_LOG`, falling back to the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = config.log_level.to_string().to_lowercase();
    EnvFilter::try_new(&directive)
        .map_err(|e| ProtocolError::ConfigError(format!("Invalid log filter '{directive}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_second_init_is_an_error() {
        let config = LoggingConfig {
            log_level: Level::WARN,
            ..LoggingConfig::default()
        };
        // One of these may race with another test's subscriber; the second never succeeds.
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(ProtocolError::ConfigError(_))
        ));
    }
}
