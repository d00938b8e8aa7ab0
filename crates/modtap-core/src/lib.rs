// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # modtap-core
//!
//! Session management for a multi-session Modbus polling tool.
//!
//! This crate owns everything between the user and the wire except the wire
//! itself:
//!
//! - **Registry**: authoritative session store and the active-session pointer
//! - **Scheduler**: one cancellable polling task per session, fenced by a
//!   per-session generation counter
//! - **Writer**: validated single writes, independent of polling
//! - **Establisher**: connects devices and allocates monotonic session ids
//! - **Gateway**: the [`DeviceGateway`] trait implemented by transports
//! - **Bus**: connection request/outcome events
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use modtap_core::{SessionDefaults, SessionManager, StaticSettings, TcpSettings};
//!
//! let manager = SessionManager::new(
//!     gateway,
//!     Arc::new(StaticSettings::default()),
//!     SessionDefaults::default(),
//! );
//! let established = manager.connect(TcpSettings::new("10.0.0.5", 502).into()).await?;
//! println!("connected {}", established.label);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod display;
pub mod error;
pub mod session;
pub mod settings;
pub mod transport;
pub mod types;

// =============================================================================
// Session Components
// =============================================================================

pub mod establisher;
pub mod gateway;
pub mod registry;
pub mod scheduler;
pub mod writer;

// =============================================================================
// Facade & Events
// =============================================================================

pub mod bus;
pub mod manager;

// =============================================================================
// Re-exports
// =============================================================================

pub use display::DisplayFormat;
pub use error::{
    BusError, ConfigurationError, ErrorSeverity, ModtapError, ModtapResult, SessionError,
    TransportError, TransportErrorKind, ValidationError,
};
pub use session::{
    PollingConfig, ReadPlan, RegisterConfig, Session, SessionConfig, SessionHealth, SessionPatch,
    SessionUpdate, UpdateOutcome,
};
pub use settings::{AddressLayout, Settings, SettingsProvider, StaticSettings, Theme};
pub use transport::{Parity, RtuSettings, StopBits, TcpSettings, TransportDescriptor};
pub use types::{ConnectionHandle, ReadFunction, RegisterType, RegisterValue, SessionId, Value};

pub use bus::{ConnectionBus, ConnectionBusStats, ConnectionOutcome, ConnectionRequested, ConnectionRequests};
pub use establisher::{ConnectionEstablisher, Established, SessionDefaults};
pub use gateway::{DeviceGateway, GatewayResult};
pub use manager::SessionManager;
pub use registry::{PollingLease, SessionRegistry};
pub use scheduler::{PollingScheduler, RequestSlot, SchedulerStats};
pub use writer::{WriteCoordinator, WriteRequest};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
