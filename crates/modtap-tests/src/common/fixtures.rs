// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Transport descriptors and session defaults shared by the integration
//! suites.

use std::time::Duration;

use modtap_core::display::DisplayFormat;
use modtap_core::establisher::SessionDefaults;
use modtap_core::session::{PollingConfig, RegisterConfig};
use modtap_core::transport::{Parity, RtuSettings, StopBits, TcpSettings, TransportDescriptor};
use modtap_core::types::RegisterType;

// =============================================================================
// Transport Fixtures
// =============================================================================

/// Fixture providing connection targets.
pub struct TransportFixtures;

impl TransportFixtures {
    /// A Modbus TCP PLC at `192.168.1.10:502`, slave 1.
    pub fn tcp_plc() -> TransportDescriptor {
        TcpSettings::new("192.168.1.10", 502).into()
    }

    /// A TCP target on a numbered host, for multi-session tests.
    pub fn tcp_numbered(n: u8) -> TransportDescriptor {
        TcpSettings::new(format!("10.0.0.{n}"), 502)
            .with_slave_id(n)
            .into()
    }

    /// A 19200 8E1 RTU target on `/dev/ttyUSB0`, slave 5.
    pub fn rtu_meter() -> TransportDescriptor {
        RtuSettings::new("/dev/ttyUSB0")
            .with_baud_rate(19200)
            .with_framing(8, Parity::Even, StopBits::One)
            .with_slave_id(5)
            .with_timeout(Duration::from_millis(500))
            .into()
    }

    /// A TCP target whose port fails validation.
    pub fn tcp_invalid_port() -> TransportDescriptor {
        TcpSettings::new("192.168.1.10", 0).into()
    }
}

// =============================================================================
// Session Fixtures
// =============================================================================

/// Fixture providing session defaults.
pub struct SessionFixtures;

impl SessionFixtures {
    /// Holding registers `start..start+count`, polled every `interval_ms`.
    pub fn holding(start: u16, count: u16, interval_ms: u64) -> SessionDefaults {
        SessionDefaults {
            register: RegisterConfig::new(RegisterType::HoldingRegister, start, count),
            display_format: DisplayFormat::Decimal,
            polling: PollingConfig {
                interval_ms,
                active: true,
            },
        }
    }

    /// Coils `start..start+count`, polled every `interval_ms`.
    pub fn coils(start: u16, count: u16, interval_ms: u64) -> SessionDefaults {
        SessionDefaults {
            register: RegisterConfig::new(RegisterType::Coil, start, count),
            ..Self::holding(start, count, interval_ms)
        }
    }

    /// Holding registers with polling switched off.
    pub fn paused() -> SessionDefaults {
        SessionDefaults {
            polling: PollingConfig {
                interval_ms: 1000,
                active: false,
            },
            ..SessionDefaults::default()
        }
    }
}
