// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the session manager.
//!
//! Errors are grouped by how far they are allowed to travel:
//!
//! ```text
//! ModtapError
//! ├── Configuration - unsupported register type or serial setting (fatal to one session)
//! ├── Transport     - connect/read/write failure (recorded for polls, surfaced for writes)
//! ├── Validation    - value outside its domain (never reaches the transport)
//! ├── Session       - registry lookups and staleness fencing
//! └── Bus           - connection event bus failures
//! ```
//!
//! None of these carry a session's state across to another session; the
//! scheduler records polling failures on the owning session only.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::types::SessionId;

/// Result alias used throughout modtap-core.
pub type ModtapResult<T> = Result<T, ModtapError>;

// =============================================================================
// ModtapError
// =============================================================================

/// The root error type.
#[derive(Debug, Clone, Error)]
pub enum ModtapError {
    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Transport errors from the device gateway.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Validation errors.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Session registry errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Connection bus errors.
    #[error("{0}")]
    Bus(#[from] BusError),
}

impl ModtapError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates an unsupported register type error.
    pub fn unsupported_register_type(name: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::unsupported_register_type(name))
    }

    /// Creates an out-of-range validation error.
    pub fn out_of_range(field: impl Into<String>, value: i64, min: i64, max: i64) -> Self {
        Self::Validation(ValidationError::out_of_range(field, value, min, max))
    }

    /// Creates a session not found error.
    pub fn session_not_found(id: SessionId) -> Self {
        Self::Session(SessionError::NotFound { id })
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Configuration(_) | Self::Validation(_) | Self::Session(_) | Self::Bus(_) => false,
        }
    }

    /// Returns `true` if the error was raised before any gateway call.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Configuration(_) => ErrorSeverity::Critical,
            Self::Transport(e) => e.severity(),
            Self::Validation(_) => ErrorSeverity::Warning,
            Self::Session(SessionError::Stale { .. }) => ErrorSeverity::Info,
            Self::Session(_) => ErrorSeverity::Warning,
            Self::Bus(_) => ErrorSeverity::Error,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Transport(_) => "transport",
            Self::Validation(_) => "validation",
            Self::Session(_) => "session",
            Self::Bus(_) => "bus",
        }
    }

    /// Returns a message suitable for showing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(e) => format!("The session configuration is not supported: {e}"),
            Self::Transport(e) => e.user_message(),
            Self::Validation(e) => e.to_string(),
            Self::Session(SessionError::NotFound { id }) => {
                format!("Connection #{id} is no longer open")
            }
            Self::Session(e) => e.to_string(),
            Self::Bus(_) => "The connection request could not be delivered".to_string(),
        }
    }

    /// Logs this error at a level matching its severity.
    pub fn log(&self, context: &str) {
        match self.severity().to_tracing_level() {
            Level::ERROR => tracing::error!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration the manager cannot act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The register type has no matching read primitive.
    #[error("Unsupported register type '{name}'")]
    UnsupportedRegisterType {
        /// The register type name as configured.
        name: String,
    },

    /// The serial backend cannot express this setting.
    #[error("Unsupported serial setting {setting} = {value}")]
    UnsupportedSerialSetting {
        /// Setting name.
        setting: &'static str,
        /// Configured value.
        value: String,
    },

    /// Generic invalid configuration.
    #[error("Invalid configuration for '{field}': {message}")]
    Invalid {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigurationError {
    /// Creates an unsupported register type error.
    pub fn unsupported_register_type(name: impl Into<String>) -> Self {
        Self::UnsupportedRegisterType { name: name.into() }
    }

    /// Creates an unsupported serial setting error.
    pub fn unsupported_serial(setting: &'static str, value: impl fmt::Display) -> Self {
        Self::UnsupportedSerialSetting {
            setting,
            value: value.to_string(),
        }
    }

    /// Creates a generic invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Failures reported by a device gateway.
///
/// Messages are kept as strings so the error can be cloned into session
/// state and across task boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not establish a connection.
    #[error("Connection to {target} failed: {message}")]
    ConnectionFailed {
        /// `host:port` or serial path.
        target: String,
        /// Failure description.
        message: String,
    },

    /// The operation did not complete in time.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Operation name.
        operation: String,
        /// Configured timeout.
        duration: Duration,
    },

    /// The device answered with a Modbus exception.
    #[error("{operation} rejected by device: exception {code:#04x} ({name})")]
    Exception {
        /// Operation name.
        operation: String,
        /// Exception code.
        code: u8,
        /// Human readable exception name.
        name: String,
    },

    /// The request failed at the I/O or framing level.
    #[error("{operation} failed: {message}")]
    RequestFailed {
        /// Operation name.
        operation: String,
        /// Failure description.
        message: String,
    },

    /// The handle does not refer to an open connection.
    #[error("Connection {handle} is not open")]
    NotConnected {
        /// The handle as displayed.
        handle: String,
    },

    /// The connection was closed underneath the request.
    #[error("Connection closed: {reason}")]
    Closed {
        /// Why the connection closed.
        reason: String,
    },
}

impl TransportError {
    /// Creates a connection failure.
    pub fn connection_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Creates an exception response error.
    pub fn exception(operation: impl Into<String>, code: u8) -> Self {
        Self::Exception {
            operation: operation.into(),
            code,
            name: exception_name(code).to_string(),
        }
    }

    /// Creates a request failure.
    pub fn request_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a not connected error.
    pub fn not_connected(handle: impl fmt::Display) -> Self {
        Self::NotConnected {
            handle: handle.to_string(),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Returns the kind of failure.
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::ConnectionFailed { .. } => TransportErrorKind::Connection,
            Self::Timeout { .. } => TransportErrorKind::Timeout,
            Self::Exception { .. } => TransportErrorKind::Exception,
            Self::RequestFailed { .. } => TransportErrorKind::Io,
            Self::NotConnected { .. } => TransportErrorKind::NotConnected,
            Self::Closed { .. } => TransportErrorKind::Closed,
        }
    }

    /// Returns `true` if the next attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Closed { .. } => true,
            // Busy / acknowledge / gateway target
            Self::Exception { code, .. } => matches!(code, 0x05 | 0x06 | 0x0B),
            Self::RequestFailed { .. } => true,
            Self::NotConnected { .. } => false,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } | Self::Closed { .. } => ErrorSeverity::Warning,
            Self::Exception { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns a message suitable for operators.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConnectionFailed { target, .. } => {
                format!("Could not connect to {target}. Check the address and that the device is online.")
            }
            Self::Timeout { .. } => "The device did not respond in time.".to_string(),
            Self::Exception { name, .. } => format!("The device rejected the request: {name}."),
            Self::RequestFailed { message, .. } => format!("Communication error: {message}"),
            Self::NotConnected { .. } => "The connection is not open.".to_string(),
            Self::Closed { .. } => "The connection was closed.".to_string(),
        }
    }
}

/// Coarse classification of [`TransportError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connect failed.
    Connection,
    /// No answer in time.
    Timeout,
    /// Modbus exception response.
    Exception,
    /// Unknown handle.
    NotConnected,
    /// Link closed by the peer.
    Closed,
    /// Other I/O or framing failure.
    Io,
}

impl TransportErrorKind {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Exception => "exception",
            Self::NotConnected => "not_connected",
            Self::Closed => "closed",
            Self::Io => "io",
        }
    }
}

/// Returns the standard name of a Modbus exception code.
pub fn exception_name(code: u8) -> &'static str {
    match code {
        0x01 => "Illegal Function",
        0x02 => "Illegal Data Address",
        0x03 => "Illegal Data Value",
        0x04 => "Server Device Failure",
        0x05 => "Acknowledge",
        0x06 => "Server Device Busy",
        0x08 => "Memory Parity Error",
        0x0A => "Gateway Path Unavailable",
        0x0B => "Gateway Target Device Failed to Respond",
        _ => "Unknown Exception",
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// A value rejected before it could reach the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Numeric value outside its allowed range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Field name.
        field: String,
        /// Rejected value.
        value: i64,
        /// Inclusive minimum.
        min: i64,
        /// Inclusive maximum.
        max: i64,
    },

    /// Write attempted against a read-only register type.
    #[error("Register type '{register_type}' is read-only")]
    ReadOnly {
        /// The register type name.
        register_type: String,
    },

    /// Writes are globally disabled by the read-only preference.
    #[error("Writes are disabled by the read-only setting")]
    WritesDisabled,

    /// A required text field is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: String,
    },

    /// Any other invalid value.
    #[error("Invalid value for '{field}': {message}")]
    Invalid {
        /// Field name.
        field: String,
        /// What is wrong.
        message: String,
    },
}

impl ValidationError {
    /// Creates an out-of-range error.
    pub fn out_of_range(field: impl Into<String>, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value,
            min,
            max,
        }
    }

    /// Creates a read-only error.
    pub fn read_only(register_type: impl fmt::Display) -> Self {
        Self::ReadOnly {
            register_type: register_type.to_string(),
        }
    }

    /// Creates an empty field error.
    pub fn empty(field: impl Into<String>) -> Self {
        Self::Empty {
            field: field.into(),
        }
    }

    /// Creates a generic validation error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Checks `value` against an inclusive range.
    pub fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), Self> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Self::out_of_range(field, value, min, max))
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Registry lookup and fencing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No session with this id.
    #[error("Session {id} not found")]
    NotFound {
        /// The missing id.
        id: SessionId,
    },

    /// A session with this id already exists.
    #[error("Session {id} already exists")]
    AlreadyExists {
        /// The duplicated id.
        id: SessionId,
    },

    /// A scheduler update carried an outdated generation.
    #[error("Stale update for session {id}: generation {generation}, current {current}")]
    Stale {
        /// Target session.
        id: SessionId,
        /// Generation the update was tagged with.
        generation: u64,
        /// The session's current generation.
        current: u64,
    },

    /// A request is already outstanding on this session.
    #[error("Session {id} has a request outstanding")]
    Busy {
        /// Target session.
        id: SessionId,
    },
}

impl SessionError {
    /// Returns `true` if the update was discarded rather than failed.
    ///
    /// Polling tasks treat both a stale generation and a removed session as
    /// a signal to stop.
    pub fn is_discard(&self) -> bool {
        matches!(self, Self::Stale { .. } | Self::NotFound { .. })
    }
}

// =============================================================================
// BusError
// =============================================================================

/// Connection bus failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Nobody is listening for connection requests any more.
    #[error("Connection request channel is closed")]
    Closed,

    /// The request queue is full.
    #[error("Connection request channel is full")]
    Full,
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational.
    Info,
    /// Warning, usually transient.
    Warning,
    /// Error requiring attention.
    Error,
    /// Critical, the affected session cannot continue.
    Critical,
}

impl ErrorSeverity {
    /// Converts to a tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_retryable() {
        assert!(TransportError::timeout("read_coils", Duration::from_secs(1)).is_retryable());
        assert!(TransportError::exception("read_coils", 0x06).is_retryable());
        assert!(!TransportError::exception("read_coils", 0x02).is_retryable());
        assert!(!TransportError::not_connected("conn-1").is_retryable());
    }

    #[test]
    fn test_transport_error_kind() {
        assert_eq!(
            TransportError::timeout("read_coils", Duration::from_secs(1)).kind(),
            TransportErrorKind::Timeout
        );
        assert_eq!(
            TransportError::closed("reset").kind().as_str(),
            "closed"
        );
    }

    #[test]
    fn test_exception_display() {
        let err = TransportError::exception("read_holding_registers", 0x02);
        assert_eq!(
            err.to_string(),
            "read_holding_registers rejected by device: exception 0x02 (Illegal Data Address)"
        );
    }

    #[test]
    fn test_timeout_display_mentions_timeout() {
        let err = TransportError::timeout("read_holding_registers", Duration::from_millis(1000));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_check_range() {
        assert!(ValidationError::check_range("value", 0, 0, 65535).is_ok());
        assert!(ValidationError::check_range("value", 65535, 0, 65535).is_ok());
        let err = ValidationError::check_range("value", 70000, 0, 65535).unwrap_err();
        assert_eq!(err.to_string(), "value must be between 0 and 65535, got 70000");
    }

    #[test]
    fn test_root_error_properties() {
        let err = ModtapError::unsupported_register_type("analog");
        assert_eq!(err.category(), "configuration");
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.is_retryable());

        let err = ModtapError::out_of_range("value", 70000, 0, 65535);
        assert!(err.is_validation());

        let err: ModtapError = TransportError::timeout("read_coils", Duration::from_secs(1)).into();
        assert_eq!(err.category(), "transport");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_session_error_discard() {
        let id = SessionId::new(3);
        assert!(SessionError::NotFound { id }.is_discard());
        assert!(SessionError::Stale { id, generation: 1, current: 2 }.is_discard());
        assert!(!SessionError::AlreadyExists { id }.is_discard());
        assert!(!SessionError::Busy { id }.is_discard());
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), Level::ERROR);
        assert_eq!(ErrorSeverity::Warning.to_string(), "warning");
    }
}
