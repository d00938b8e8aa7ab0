// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```text
//! ModtapConfig
//! ├── logging: LoggingConfig
//! ├── polling: PollingSection
//! ├── register: RegisterSection
//! ├── settings: Settings
//! └── connections: Vec<TransportDescriptor>
//! ```

use serde::{Deserialize, Serialize};

use modtap_core::display::DisplayFormat;
use modtap_core::establisher::SessionDefaults;
use modtap_core::session::{PollingConfig, RegisterConfig, DEFAULT_INTERVAL_MS};
use modtap_core::settings::Settings;
use modtap_core::transport::TransportDescriptor;
use modtap_core::types::RegisterType;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default number of items read per poll.
pub const DEFAULT_COUNT: u16 = 10;

/// Maximum polling interval in milliseconds (1 hour).
pub const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModtapConfig {
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Polling defaults for new sessions.
    #[serde(default)]
    pub polling: PollingSection,

    /// Register block defaults for new sessions.
    #[serde(default)]
    pub register: RegisterSection,

    /// User preferences.
    #[serde(default)]
    pub settings: Settings,

    /// Devices to connect on start.
    #[serde(default)]
    pub connections: Vec<TransportDescriptor>,
}

impl ModtapConfig {
    /// Validates every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.polling.validate()?;
        self.register.validate()?;
        for (i, connection) in self.connections.iter().enumerate() {
            connection
                .validate()
                .map_err(|e| ConfigError::at(format!("connections[{i}]"), e))?;
        }
        Ok(())
    }

    /// Returns the defaults applied to new sessions.
    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            register: self.register.register_config(),
            display_format: self.register.display_format,
            polling: self.polling.polling_config(),
        }
    }
}

// =============================================================================
// Polling
// =============================================================================

/// `polling` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingSection {
    /// Interval between reads in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Start polling as soon as a session opens.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_active() -> bool {
    true
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            active: true,
        }
    }
}

impl PollingSection {
    /// Validates the section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms == 0 || self.interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::validation(
                "polling.interval_ms",
                format!("must be between 1 and {MAX_POLL_INTERVAL_MS}"),
            ));
        }
        Ok(())
    }

    /// Converts to a session polling config.
    pub fn polling_config(&self) -> PollingConfig {
        PollingConfig {
            interval_ms: self.interval_ms,
            active: self.active,
        }
    }
}

// =============================================================================
// Register
// =============================================================================

/// `register` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterSection {
    /// First address.
    #[serde(default)]
    pub start_address: u16,

    /// Number of items.
    #[serde(default = "default_count")]
    pub count: u16,

    /// Register class.
    #[serde(default)]
    pub register_type: RegisterType,

    /// How values are shown.
    #[serde(default)]
    pub display_format: DisplayFormat,
}

fn default_count() -> u16 {
    DEFAULT_COUNT
}

impl Default for RegisterSection {
    fn default() -> Self {
        Self {
            start_address: 0,
            count: DEFAULT_COUNT,
            register_type: RegisterType::HoldingRegister,
            display_format: DisplayFormat::Decimal,
        }
    }
}

impl RegisterSection {
    /// Validates the section. Unknown register types are rejected here.
    pub fn validate(&self) -> ConfigResult<()> {
        if let RegisterType::Unsupported(name) = &self.register_type {
            return Err(ConfigError::validation(
                "register.register_type",
                format!("unsupported register type '{name}'"),
            ));
        }
        self.register_config()
            .validate()
            .map_err(|e| ConfigError::at("register", e))
    }

    /// Converts to a session register config.
    pub fn register_config(&self) -> RegisterConfig {
        RegisterConfig::new(self.register_type.clone(), self.start_address, self.count)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// `logging` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, accepting `warning` for `warn`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

impl LogFormat {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modtap_core::transport::TcpSettings;

    #[test]
    fn test_defaults_are_valid() {
        let config = ModtapConfig::default();
        assert!(config.validate().is_ok());
        let defaults = config.session_defaults();
        assert_eq!(defaults.polling, PollingConfig::default());
        assert_eq!(defaults.register, RegisterConfig::default());
        assert_eq!(defaults.display_format, DisplayFormat::Decimal);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = ModtapConfig {
            polling: PollingSection {
                interval_ms: 0,
                active: true,
            },
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_register_count_limits() {
        let mut section = RegisterSection {
            count: 126,
            ..Default::default()
        };
        assert!(section.validate().is_err());

        section.register_type = RegisterType::Coil;
        assert!(section.validate().is_ok());

        section.count = 2001;
        assert!(section.validate().is_err());
    }

    #[test]
    fn test_unsupported_register_type_rejected() {
        let section = RegisterSection {
            register_type: RegisterType::parse("analog"),
            ..Default::default()
        };
        assert!(section.validate().is_err());
    }

    #[test]
    fn test_connection_error_names_index() {
        let config = ModtapConfig {
            connections: vec![
                TcpSettings::new("plc", 502).into(),
                TcpSettings::new("", 502).into(),
            ],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connections[1]"));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
