// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport descriptors for TCP and RTU connections.
//!
//! A [`TransportDescriptor`] is the discriminated payload of a connection
//! request. It carries everything the device gateway needs to open a link
//! and the slave id every later request is addressed to.
//!
//! # Example
//!
//! ```
//! use modtap_core::transport::{TcpSettings, TransportDescriptor};
//!
//! let descriptor = TransportDescriptor::Tcp(
//!     TcpSettings::new("192.168.1.100", 502).with_slave_id(3),
//! );
//! assert!(descriptor.validate().is_ok());
//! assert_eq!(descriptor.label(), "192.168.1.100:502");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// =============================================================================
// Defaults
// =============================================================================

/// Default Modbus TCP port.
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default number of connect attempts.
pub const DEFAULT_RETRIES: u8 = 3;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_slave_id() -> u8 {
    1
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_retries() -> u8 {
    DEFAULT_RETRIES
}

fn default_true() -> bool {
    true
}

fn default_reconnect_interval() -> Duration {
    DEFAULT_RECONNECT_INTERVAL
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_data_bits() -> u8 {
    8
}

// =============================================================================
// TcpSettings
// =============================================================================

/// Modbus TCP connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpSettings {
    /// Hostname or IP address.
    pub host: String,

    /// TCP port.
    #[serde(default = "default_tcp_port")]
    pub port: u16,

    /// Target unit id.
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,

    /// Timeout for the connect and for each request.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Number of connect attempts.
    #[serde(default = "default_retries")]
    pub retries: u8,

    /// Re-open the socket when a request finds it broken.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Minimum delay between reconnect attempts.
    #[serde(default = "default_reconnect_interval", with = "humantime_serde")]
    pub reconnect_interval: Duration,
}

impl TcpSettings {
    /// Creates settings with defaults for everything but the address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            slave_id: default_slave_id(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            auto_reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }

    /// Sets the slave id.
    pub fn with_slave_id(mut self, slave_id: u8) -> Self {
        self.slave_id = slave_id;
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of connect attempts.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    /// Enables or disables automatic reconnection.
    pub fn with_auto_reconnect(mut self, enabled: bool, interval: Duration) -> Self {
        self.auto_reconnect = enabled;
        self.reconnect_interval = interval;
        self
    }

    /// Returns `host:port`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates ranges accepted by the connection form.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::empty("host"));
        }
        ValidationError::check_range("port", i64::from(self.port), 1, 65535)?;
        // slave id 0..=255 always holds for u8
        validate_timeout(self.timeout)?;
        validate_retries(self.retries)?;
        ValidationError::check_range(
            "reconnect_interval_ms",
            millis(self.reconnect_interval),
            100,
            60_000,
        )
    }
}

// =============================================================================
// Serial settings
// =============================================================================

/// Serial parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
    /// Parity bit always 1.
    Mark,
    /// Parity bit always 0.
    Space,
}

impl Parity {
    /// Returns the lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Even => "even",
            Self::Odd => "odd",
            Self::Mark => "mark",
            Self::Space => "space",
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "even" | "e" => Ok(Self::Even),
            "odd" | "o" => Ok(Self::Odd),
            "mark" | "m" => Ok(Self::Mark),
            "space" | "s" => Ok(Self::Space),
            other => Err(ValidationError::invalid("parity", format!("unknown parity '{other}'"))),
        }
    }
}

/// Serial stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StopBits {
    /// One stop bit.
    #[default]
    #[serde(rename = "1")]
    One,
    /// One and a half stop bits.
    #[serde(rename = "1.5")]
    OnePointFive,
    /// Two stop bits.
    #[serde(rename = "2")]
    Two,
}

impl StopBits {
    /// Returns the textual form used in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::One => "1",
            Self::OnePointFive => "1.5",
            Self::Two => "2",
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StopBits {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::One),
            "1.5" => Ok(Self::OnePointFive),
            "2" => Ok(Self::Two),
            other => Err(ValidationError::invalid(
                "stop_bits",
                format!("expected 1, 1.5 or 2, got '{other}'"),
            )),
        }
    }
}

/// Modbus RTU connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtuSettings {
    /// Serial port path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,

    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits (5 to 8).
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Parity.
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits.
    #[serde(default)]
    pub stop_bits: StopBits,

    /// Target slave id.
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,

    /// Timeout for each request.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Number of connect attempts.
    #[serde(default = "default_retries")]
    pub retries: u8,
}

impl RtuSettings {
    /// Creates 9600 8N1 settings for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: default_data_bits(),
            parity: Parity::None,
            stop_bits: StopBits::One,
            slave_id: default_slave_id(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Sets the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the character framing.
    pub fn with_framing(mut self, data_bits: u8, parity: Parity, stop_bits: StopBits) -> Self {
        self.data_bits = data_bits;
        self.parity = parity;
        self.stop_bits = stop_bits;
        self
    }

    /// Sets the slave id.
    pub fn with_slave_id(mut self, slave_id: u8) -> Self {
        self.slave_id = slave_id;
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of connect attempts.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    /// Validates ranges accepted by the connection form.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path.trim().is_empty() {
            return Err(ValidationError::empty("path"));
        }
        ValidationError::check_range("baud_rate", i64::from(self.baud_rate), 1200, 115_200)?;
        ValidationError::check_range("data_bits", i64::from(self.data_bits), 5, 8)?;
        ValidationError::check_range("slave_id", i64::from(self.slave_id), 1, 247)?;
        validate_timeout(self.timeout)?;
        validate_retries(self.retries)
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn validate_timeout(timeout: Duration) -> Result<(), ValidationError> {
    ValidationError::check_range("timeout_ms", millis(timeout), 100, 10_000)
}

fn validate_retries(retries: u8) -> Result<(), ValidationError> {
    ValidationError::check_range("retries", i64::from(retries), 0, 10)
}

// =============================================================================
// TransportDescriptor
// =============================================================================

/// A TCP or RTU connection target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum TransportDescriptor {
    /// Modbus TCP.
    Tcp(TcpSettings),
    /// Modbus RTU over a serial line.
    Rtu(RtuSettings),
}

impl TransportDescriptor {
    /// Returns `"tcp"` or `"rtu"`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            Self::Rtu(_) => "rtu",
        }
    }

    /// Display label: `host:port` for TCP, the port path for RTU.
    pub fn label(&self) -> String {
        match self {
            Self::Tcp(s) => s.socket_addr(),
            Self::Rtu(s) => s.path.clone(),
        }
    }

    /// Slave id requests are addressed to.
    pub fn slave_id(&self) -> u8 {
        match self {
            Self::Tcp(s) => s.slave_id,
            Self::Rtu(s) => s.slave_id,
        }
    }

    /// Changes the slave id.
    pub fn set_slave_id(&mut self, slave_id: u8) {
        match self {
            Self::Tcp(s) => s.slave_id = slave_id,
            Self::Rtu(s) => s.slave_id = slave_id,
        }
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Tcp(s) => s.timeout,
            Self::Rtu(s) => s.timeout,
        }
    }

    /// Validates the variant's ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Tcp(s) => s.validate(),
            Self::Rtu(s) => s.validate(),
        }
    }
}

impl From<TcpSettings> for TransportDescriptor {
    fn from(settings: TcpSettings) -> Self {
        Self::Tcp(settings)
    }
}

impl From<RtuSettings> for TransportDescriptor {
    fn from(settings: RtuSettings) -> Self {
        Self::Rtu(settings)
    }
}

// =============================================================================
// Tests
// =============================================================================
