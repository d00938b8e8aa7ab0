// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Display formats for register values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{RegisterValue, Value};

/// How a session's values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayFormat {
    /// Unsigned decimal.
    #[default]
    Decimal,
    /// `0x` prefixed, four hex digits.
    Hex,
    /// Sixteen binary digits.
    Binary,
    /// IEEE 754 single precision over two consecutive words.
    Float,
    /// Signed 32-bit integer over two consecutive words.
    Int32,
    /// Two ASCII characters per word.
    Ascii,
}

impl DisplayFormat {
    /// All formats, in menu order.
    pub const ALL: [Self; 6] = [
        Self::Decimal,
        Self::Hex,
        Self::Binary,
        Self::Float,
        Self::Int32,
        Self::Ascii,
    ];

    /// Returns the lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decimal => "decimal",
            Self::Hex => "hex",
            Self::Binary => "binary",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Ascii => "ascii",
        }
    }

    /// Returns `true` if a rendered item spans two registers.
    pub const fn is_wide(self) -> bool {
        matches!(self, Self::Float | Self::Int32)
    }

    /// Renders a single value.
    ///
    /// Bits always render as `0`/`1`. Wide formats render a lone word in
    /// decimal; use [`DisplayFormat::render_block`] to combine pairs.
    pub fn render(self, value: Value) -> String {
        let word = match value {
            Value::Bit(b) => return u8::from(b).to_string(),
            Value::Word(w) => w,
        };
        match self {
            Self::Decimal | Self::Float | Self::Int32 => word.to_string(),
            Self::Hex => format!("0x{word:04X}"),
            Self::Binary => format!("{word:016b}"),
            Self::Ascii => word
                .to_be_bytes()
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect(),
        }
    }

    /// Renders an ordered block, combining word pairs for wide formats.
    ///
    /// Pairs are big-endian (high word first) and keyed by the address of
    /// the first word. An unpaired trailing word renders in decimal.
    pub fn render_block(self, values: &[RegisterValue]) -> Vec<(u16, String)> {
        if !self.is_wide() {
            return values
                .iter()
                .map(|v| (v.address, self.render(v.value)))
                .collect();
        }

        values
            .chunks(2)
            .filter_map(|pair| match pair {
                [hi, lo] => {
                    let raw = (u32::from(hi.value.as_u16()) << 16) | u32::from(lo.value.as_u16());
                    let text = match self {
                        Self::Float => f32::from_bits(raw).to_string(),
                        _ => (raw as i32).to_string(),
                    };
                    Some((hi.address, text))
                }
                [single] => Some((single.address, single.value.as_u16().to_string())),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for DisplayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decimal" | "dec" => Ok(Self::Decimal),
            "hex" | "hexadecimal" => Ok(Self::Hex),
            "binary" | "bin" => Ok(Self::Binary),
            "float" | "float32" => Ok(Self::Float),
            "int32" => Ok(Self::Int32),
            "ascii" => Ok(Self::Ascii),
            other => Err(ValidationError::invalid(
                "display_format",
                format!("unknown format '{other}'"),
            )),
        }
    }
}
