// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A [`SessionManager`] wired to a [`MockGateway`] and in-memory settings.

use std::sync::Arc;
use std::time::Duration;

use modtap_core::establisher::{Established, SessionDefaults};
use modtap_core::manager::SessionManager;
use modtap_core::session::Session;
use modtap_core::settings::StaticSettings;
use modtap_core::transport::TransportDescriptor;
use modtap_core::types::SessionId;

use super::mocks::MockGateway;

/// Everything a session-level test needs.
pub struct TestHarness {
    /// The mock gateway.
    pub gateway: Arc<MockGateway>,
    /// Settings handed to the write coordinator.
    pub settings: Arc<StaticSettings>,
    /// The manager under test, shareable with read hooks and spawned tasks.
    pub manager: Arc<SessionManager>,
}

impl TestHarness {
    /// Creates a harness whose sessions start with `defaults`.
    pub fn new(defaults: SessionDefaults) -> Self {
        let gateway = Arc::new(MockGateway::new());
        let settings = Arc::new(StaticSettings::default());
        let manager = Arc::new(SessionManager::new(
            gateway.clone(),
            settings.clone(),
            defaults,
        ));
        Self {
            gateway,
            settings,
            manager,
        }
    }

    /// Connects `descriptor`, panicking on failure.
    pub async fn connect(&self, descriptor: TransportDescriptor) -> Established {
        self.manager
            .connect(descriptor)
            .await
            .expect("connect should succeed")
    }

    /// Returns a snapshot of `id`, panicking if it is gone.
    pub fn session(&self, id: SessionId) -> Session {
        self.manager.session(id).expect("session should exist")
    }

    /// Lets spawned tasks run and advances a paused clock by `duration`.
    pub async fn advance(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
        settle().await;
    }
}

/// Yields until spawned tasks have had a chance to run.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
