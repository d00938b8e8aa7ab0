// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # modtap Integration Tests
//!
//! Test utilities and integration suites for the modtap workspace.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p modtap-tests
//! cargo test -p modtap-tests --test integration_scheduler
//! ```
//!
//! ## Test Suites
//!
//! - `integration_registry.rs`: session lifecycle and the active pointer
//! - `integration_scheduler.rs`: cadence, backpressure and stale results
//! - `integration_writer.rs`: write validation and error channels
//! - `integration_establisher.rs`: connects, id allocation and the bus
//! - `integration_config.rs`: configuration files feeding the manager
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use modtap_tests::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_something() {
//!     let harness = TestHarness::new(SessionFixtures::holding(0, 5, 1000));
//!     let session = harness.connect(TransportFixtures::tcp_plc()).await;
//!     harness.advance(Duration::from_millis(10)).await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Commonly used items.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::init_test_logging;
}
