// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging initialization.
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use modtap_config::LoggingConfig;

use crate::cli::LogFormat;

/// Reads the `logging` section of the config file, if one can be loaded.
///
/// Logging is not up yet, so a broken file yields the defaults here and is
/// reported by the command that needs it.
pub fn configured(path: &Path) -> LoggingConfig {
    if !path.exists() {
        return LoggingConfig::default();
    }
    modtap_config::load_config(path)
        .map(|config| config.logging)
        .unwrap_or_default()
}

/// Initializes the global subscriber.
///
/// Calling this twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = build_filter(level);
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(is_terminal),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(is_terminal),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// Builds the filter for `level`, quieting the serial and Modbus stacks.
pub fn build_filter(level: &str) -> EnvFilter {
    let base = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    ["tokio_modbus=warn", "tokio_serial=warn", "mio_serial=warn"]
        .into_iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(base, |filter, directive| filter.add_directive(directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let filter = build_filter(level).to_string();
            assert!(filter.contains("tokio_modbus=warn"), "{filter}");
        }
    }

    #[test]
    fn test_configured_defaults_without_file() {
        let logging = configured(Path::new("/nonexistent/modtap.yaml"));
        assert_eq!(logging, LoggingConfig::default());
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let filter = build_filter("not a level ==").to_string();
        assert!(filter.contains("tokio_serial=warn"));
    }
}
