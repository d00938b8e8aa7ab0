// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the modtap binary.

use thiserror::Error;

/// Result type alias for binary operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Config loading error.
    #[error("Config error: {0}")]
    Config(#[from] modtap_config::ConfigError),

    /// Session manager error.
    #[error(transparent)]
    Modtap(#[from] modtap_core::ModtapError),

    /// Error with added context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::Modtap(e) => match e {
                modtap_core::ModtapError::Configuration(_) => 1,
                modtap_core::ModtapError::Validation(_) => 2,
                modtap_core::ModtapError::Transport(_) => 5,
                modtap_core::ModtapError::Session(_) | modtap_core::ModtapError::Bus(_) => 3,
            },
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<modtap_core::TransportError> for BinError {
    fn from(err: modtap_core::TransportError) -> Self {
        Self::Modtap(err.into())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints an error and its cause chain to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with its exit code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modtap_core::{TransportError, ValidationError};

    #[test]
    fn test_error_with_context() {
        let err = BinError::config("no connections").with_context("run");
        assert_eq!(err.to_string(), "run: Configuration error: no connections");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::runtime("x").exit_code(), 3);
        assert_eq!(BinError::Io("x".into()).exit_code(), 4);

        let validation: BinError = modtap_core::ModtapError::from(ValidationError::WritesDisabled).into();
        assert_eq!(validation.exit_code(), 2);

        let transport: BinError = TransportError::connection_failed("plc:502", "refused").into();
        assert_eq!(transport.exit_code(), 5);
    }
}
