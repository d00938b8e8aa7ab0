// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # modtap-bin
//!
//! Command line front end for the modtap session manager.
//!
//! ```text
//!                 main.rs
//!                    │
//!              ┌─────▼─────┐
//!              │  cli.rs   │
//!              └─────┬─────┘
//!        ┌───────────┼───────────┐
//!        ▼           ▼           ▼
//!   ┌──────────┐ ┌─────────┐ ┌──────────┐
//!   │ commands │ │ logging │ │ shutdown │
//!   └────┬─────┘ └─────────┘ └──────────┘
//!        │
//!   ┌────▼──────────────────────────────┐
//!   │ modtap-core / -modbus / -config   │
//!   └───────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Poll every configured device (default command)
//! modtap -c plant.yaml
//!
//! # One-shot read of 8 holding registers as floats
//! modtap read --host 10.0.0.5 -a 100 -n 8 -f float
//!
//! # Switch a coil on over RTU
//! modtap write --serial /dev/ttyUSB0 --baud-rate 19200 -t coil -a 3 1
//!
//! # Check a configuration file
//! modtap validate --strict
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
