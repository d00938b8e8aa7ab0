// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # modtap-config
//!
//! Configuration for the modtap CLI.
//!
//! - **Multi-format**: YAML, TOML and JSON, picked by file extension
//! - **Placeholders**: `${VAR}` and `${VAR:default}` in the raw file
//! - **Overrides**: `MODTAP_LOG_LEVEL`, `MODTAP_POLL_INTERVAL_MS`, `MODTAP_READ_ONLY`
//! - **Validation**: polling interval, register block limits and every
//!   connection descriptor are checked on load
//!
//! ## Quick Start
//!
//! ```no_run
//! use modtap_config::load_config;
//!
//! let config = load_config("modtap.yaml").unwrap();
//! let defaults = config.session_defaults();
//! println!("polling every {} ms", defaults.polling.interval_ms);
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! logging:
//!   level: info
//!   format: text
//! polling:
//!   interval_ms: 1000
//!   active: true
//! register:
//!   start_address: 0
//!   count: 10
//!   register_type: holding
//!   display_format: decimal
//! settings:
//!   read_only: false
//! connections:
//!   - transport: tcp
//!     host: ${PLC_HOST:192.168.1.10}
//!     port: 502
//!     slave_id: 1
//!     timeout: 1s
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, ConfigFormat, ConfigLoader};
pub use schema::{LogFormat, LogLevel, LoggingConfig, ModtapConfig, PollingSection, RegisterSection};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
