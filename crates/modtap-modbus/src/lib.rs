// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # modtap-modbus
//!
//! Modbus TCP/RTU implementation of the modtap device gateway.
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 ModbusGateway                   │
//! │        (DeviceGateway impl, handle map)         │
//! └─────────────────────────────────────────────────┘
//!            │                         │
//!            ▼                         ▼
//! ┌─────────────────────┐   ┌─────────────────────┐
//! │   TCP (tokio-net)   │   │  RTU (tokio-serial) │
//! └─────────────────────┘   └─────────────────────┘
//!                 tokio-modbus client context
//! ```
//!
//! Every connect is followed by a probe read of one coil at address 1,
//! repeated up to the configured retry count with a one second pause.
//! Requests carry the caller's slave id and are bounded by the connection
//! timeout.
//!
//! ## Example
//!
//! ```rust,ignore
//! use modtap_core::{DeviceGateway, TcpSettings};
//! use modtap_modbus::ModbusGateway;
//!
//! let gateway = ModbusGateway::new();
//! let handle = gateway.connect_tcp(&TcpSettings::new("192.168.1.10", 502)).await?;
//! let values = gateway.read_holding_registers(handle, 0, 10, 1).await?;
//! gateway.close(handle).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod connect;
mod error;
pub mod gateway;

pub use gateway::{ModbusGateway, DEFAULT_PROBE_DELAY};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
