// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Identifiers, register types and register values.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::display::DisplayFormat;
use crate::error::ConfigurationError;

// =============================================================================
// SessionId
// =============================================================================

/// Identifier of an open session.
///
/// Issued once by the connection establisher and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u32);

impl SessionId {
    /// Wraps a raw id.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SessionId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

// =============================================================================
// ConnectionHandle
// =============================================================================

/// Opaque reference to a connection owned by a device gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Wraps a raw handle value.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// =============================================================================
// RegisterType
// =============================================================================

/// Modbus object class a session reads from.
///
/// Names are parsed leniently. A name that matches none of the four classes
/// is kept as [`RegisterType::Unsupported`] instead of being rejected, so the
/// polling scheduler can fault that one session while the rest keep running.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum RegisterType {
    /// Coil (read/write, 1 bit).
    Coil,
    /// Discrete input (read-only, 1 bit).
    DiscreteInput,
    /// Holding register (read/write, 16 bits).
    #[default]
    HoldingRegister,
    /// Input register (read-only, 16 bits).
    InputRegister,
    /// A register type name that has no read primitive.
    Unsupported(String),
}

impl RegisterType {
    /// Parses a register type name. Never fails.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "coil" | "coils" | "co" | "0x" => Self::Coil,
            "discrete" | "discrete_input" | "discrete_inputs" | "di" | "1x" => Self::DiscreteInput,
            "holding" | "holding_register" | "holding_registers" | "hr" | "4x" => {
                Self::HoldingRegister
            }
            "input" | "input_register" | "input_registers" | "ir" | "3x" => Self::InputRegister,
            _ => Self::Unsupported(name.to_string()),
        }
    }

    /// Returns the canonical short name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Coil => "coil",
            Self::DiscreteInput => "discrete",
            Self::HoldingRegister => "holding",
            Self::InputRegister => "input",
            Self::Unsupported(name) => name,
        }
    }

    /// Returns the full Modbus name.
    pub fn full_name(&self) -> &str {
        match self {
            Self::Coil => "Coil",
            Self::DiscreteInput => "Discrete Input",
            Self::HoldingRegister => "Holding Register",
            Self::InputRegister => "Input Register",
            Self::Unsupported(name) => name,
        }
    }

    /// Returns `true` for the read-only classes.
    #[inline]
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::DiscreteInput | Self::InputRegister)
    }

    /// Returns `true` for the classes with a single-write primitive.
    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Coil | Self::HoldingRegister)
    }

    /// Returns `true` for 1-bit classes.
    #[inline]
    pub fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    /// Returns `false` for [`RegisterType::Unsupported`].
    #[inline]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Maximum number of items one read request may cover.
    pub fn max_read_count(&self) -> Option<u16> {
        match self {
            Self::Coil | Self::DiscreteInput => Some(2000),
            Self::HoldingRegister | Self::InputRegister => Some(125),
            Self::Unsupported(_) => None,
        }
    }

    /// Maps this register type to its gateway read primitive.
    pub fn read_function(&self) -> Result<ReadFunction, ConfigurationError> {
        match self {
            Self::Coil => Ok(ReadFunction::Coils),
            Self::DiscreteInput => Ok(ReadFunction::DiscreteInputs),
            Self::HoldingRegister => Ok(ReadFunction::HoldingRegisters),
            Self::InputRegister => Ok(ReadFunction::InputRegisters),
            Self::Unsupported(name) => Err(ConfigurationError::unsupported_register_type(name)),
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegisterType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for RegisterType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RegisterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}

// =============================================================================
// ReadFunction
// =============================================================================

/// The four gateway read primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadFunction {
    /// `read_coils`
    Coils,
    /// `read_discrete_inputs`
    DiscreteInputs,
    /// `read_holding_registers`
    HoldingRegisters,
    /// `read_input_registers`
    InputRegisters,
}

impl ReadFunction {
    /// Operation name used in logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Coils => "read_coils",
            Self::DiscreteInputs => "read_discrete_inputs",
            Self::HoldingRegisters => "read_holding_registers",
            Self::InputRegisters => "read_input_registers",
        }
    }

    /// Modbus function code.
    pub const fn function_code(self) -> u8 {
        match self {
            Self::Coils => 0x01,
            Self::DiscreteInputs => 0x02,
            Self::HoldingRegisters => 0x03,
            Self::InputRegisters => 0x04,
        }
    }
}

impl fmt::Display for ReadFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Value / RegisterValue
// =============================================================================

/// A single register reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Coil or discrete input state.
    Bit(bool),
    /// Holding or input register content.
    Word(u16),
}

impl Value {
    /// Returns the value as a 16-bit word (bits become 0 or 1).
    #[inline]
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Bit(b) => u16::from(b),
            Self::Word(w) => w,
        }
    }

    /// Returns the value as a boolean (words are `true` when non-zero).
    #[inline]
    pub fn as_bool(self) -> bool {
        match self {
            Self::Bit(b) => b,
            Self::Word(w) => w != 0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A value at a register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterValue {
    /// Register address.
    pub address: u16,
    /// Value read from (or written to) that address.
    pub value: Value,
}

impl RegisterValue {
    /// Creates a bit value.
    #[inline]
    pub const fn bit(address: u16, value: bool) -> Self {
        Self {
            address,
            value: Value::Bit(value),
        }
    }

    /// Creates a word value.
    #[inline]
    pub const fn word(address: u16, value: u16) -> Self {
        Self {
            address,
            value: Value::Word(value),
        }
    }

    /// Renders this value on its own in `format`.
    pub fn render(&self, format: DisplayFormat) -> String {
        format.render(self.value)
    }

    /// Builds an ordered block of bit values starting at `start`.
    pub fn bits(start: u16, values: impl IntoIterator<Item = bool>) -> Vec<Self> {
        values
            .into_iter()
            .zip(start..=u16::MAX)
            .map(|(v, address)| Self::bit(address, v))
            .collect()
    }

    /// Builds an ordered block of word values starting at `start`.
    pub fn words(start: u16, values: impl IntoIterator<Item = u16>) -> Vec<Self> {
        values
            .into_iter()
            .zip(start..=u16::MAX)
            .map(|(v, address)| Self::word(address, v))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_type_parse() {
        assert_eq!(RegisterType::parse("coil"), RegisterType::Coil);
        assert_eq!(RegisterType::parse("Discrete"), RegisterType::DiscreteInput);
        assert_eq!(RegisterType::parse("holding"), RegisterType::HoldingRegister);
        assert_eq!(RegisterType::parse(" input "), RegisterType::InputRegister);
        assert_eq!(
            RegisterType::parse("analog"),
            RegisterType::Unsupported("analog".to_string())
        );
    }

    #[test]
    fn test_register_type_access() {
        assert!(RegisterType::DiscreteInput.is_read_only());
        assert!(RegisterType::InputRegister.is_read_only());
        assert!(!RegisterType::Coil.is_read_only());
        assert!(RegisterType::HoldingRegister.is_writable());
        assert!(!RegisterType::Unsupported("x".into()).is_writable());
    }

    #[test]
    fn test_read_function_mapping() {
        assert_eq!(RegisterType::Coil.read_function(), Ok(ReadFunction::Coils));
        assert_eq!(
            RegisterType::DiscreteInput.read_function(),
            Ok(ReadFunction::DiscreteInputs)
        );
        assert_eq!(
            RegisterType::HoldingRegister.read_function(),
            Ok(ReadFunction::HoldingRegisters)
        );
        assert_eq!(
            RegisterType::InputRegister.read_function(),
            Ok(ReadFunction::InputRegisters)
        );
        assert!(RegisterType::parse("analog").read_function().is_err());
    }

    #[test]
    fn test_register_type_serde_keeps_unknown_names() {
        let parsed: RegisterType = serde_json::from_str("\"analog\"").unwrap();
        assert_eq!(parsed, RegisterType::Unsupported("analog".to_string()));
        assert_eq!(
            serde_json::to_string(&RegisterType::DiscreteInput).unwrap(),
            "\"discrete\""
        );
    }

    #[test]
    fn test_register_value_blocks_are_ordered() {
        let block = RegisterValue::words(10, [1, 2, 3]);
        assert_eq!(
            block,
            vec![
                RegisterValue::word(10, 1),
                RegisterValue::word(11, 2),
                RegisterValue::word(12, 3),
            ]
        );
        assert_eq!(RegisterValue::bits(0, [true, false])[1], RegisterValue::bit(1, false));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Bit(true).as_u16(), 1);
        assert!(Value::Word(7).as_bool());
        assert_eq!(Value::Word(42).to_string(), "42");
    }
}
