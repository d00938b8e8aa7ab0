// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The session manager.
//!
//! [`SessionManager`] wires the registry, scheduler, write coordinator and
//! connection establisher over a single device gateway and exposes the
//! operations a front end needs.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = SessionManager::new(gateway, settings, SessionDefaults::default());
//! let established = manager.connect(TcpSettings::new("10.0.0.5", 502).into()).await?;
//! manager.update_register_config(
//!     established.session_id,
//!     RegisterConfig::new(RegisterType::Coil, 0, 16),
//! )?;
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::ConnectionRequests;
use crate::display::DisplayFormat;
use crate::error::{ModtapResult, SessionError};
use crate::establisher::{ConnectionEstablisher, Established, SessionDefaults};
use crate::gateway::DeviceGateway;
use crate::registry::SessionRegistry;
use crate::scheduler::{PollingScheduler, SchedulerStats};
use crate::session::{RegisterConfig, Session, SessionPatch, SessionUpdate};
use crate::settings::SettingsProvider;
use crate::transport::TransportDescriptor;
use crate::types::{RegisterValue, SessionId};
use crate::writer::{WriteCoordinator, WriteRequest};

/// Front-end facade over all session components.
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn DeviceGateway>,
    scheduler: PollingScheduler,
    writer: WriteCoordinator,
    establisher: ConnectionEstablisher,
}

impl SessionManager {
    /// Creates a manager with an empty registry.
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        settings: Arc<dyn SettingsProvider>,
        defaults: SessionDefaults,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let scheduler = PollingScheduler::new(registry.clone(), gateway.clone());
        let writer = WriteCoordinator::new(registry.clone(), gateway.clone(), settings);
        let establisher = ConnectionEstablisher::new(
            registry.clone(),
            scheduler.clone(),
            gateway.clone(),
            defaults,
        );
        Self {
            registry,
            gateway,
            scheduler,
            writer,
            establisher,
        }
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Returns the polling scheduler.
    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    /// Returns polling counters.
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects a device and opens a polling session for it.
    pub async fn connect(&self, descriptor: TransportDescriptor) -> ModtapResult<Established> {
        self.establisher.establish(descriptor).await
    }

    /// Serves connection requests until every bus sender is dropped or
    /// `shutdown` fires.
    pub async fn serve_connections(&self, requests: ConnectionRequests, shutdown: CancellationToken) {
        self.establisher.run(requests, shutdown).await;
    }

    /// Closes a session.
    ///
    /// The polling task is cancelled and the session removed before the
    /// connection is closed, so no result can land after this returns.
    pub async fn close(&self, id: SessionId) -> ModtapResult<()> {
        let session = self.registry.remove(id)?;
        if let Err(e) = self.gateway.close(session.handle).await {
            debug!(session_id = %id, handle = %session.handle, error = %e, "Close failed");
        }
        info!(session_id = %id, label = %session.label, "Session closed");
        Ok(())
    }

    /// Closes every session.
    ///
    /// All polling is stopped before the first connection is closed.
    pub async fn shutdown(&self) {
        let ids = self.registry.ids();
        let count = ids.len();
        for &id in &ids {
            let _ = self.scheduler.stop(id);
        }
        for id in ids {
            // a concurrent close may have won the race
            let _ = self.close(id).await;
        }
        info!(sessions = count, "All sessions closed");
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns a snapshot of one session.
    pub fn session(&self, id: SessionId) -> ModtapResult<Session> {
        Ok(self.registry.get(id)?)
    }

    /// Returns snapshots of all sessions, ordered by id.
    pub fn sessions(&self) -> Vec<Session> {
        let mut sessions = self.registry.list();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    /// Returns the active session id.
    pub fn active_id(&self) -> Option<SessionId> {
        self.registry.active_id()
    }

    /// Makes a session active, or clears the active session.
    pub fn set_active(&self, id: Option<SessionId>) -> Result<(), SessionError> {
        self.registry.set_active_id(id)
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Applies an edit and restarts polling if the cadence changed.
    pub fn edit(&self, id: SessionId, patch: SessionPatch) -> ModtapResult<()> {
        let outcome = self.registry.update(id, SessionUpdate::Edit(patch))?;
        if outcome.cadence_changed {
            self.scheduler.sync(id)?;
        }
        Ok(())
    }

    /// Changes the register block.
    pub fn update_register_config(&self, id: SessionId, register: RegisterConfig) -> ModtapResult<()> {
        self.edit(
            id,
            SessionPatch::new()
                .start_address(register.start_address)
                .count(register.count)
                .register_type(register.register_type),
        )
    }

    /// Changes the slave id requests are addressed to.
    pub fn set_slave_id(&self, id: SessionId, slave_id: u8) -> ModtapResult<()> {
        self.edit(id, SessionPatch::new().slave_id(slave_id))
    }

    /// Switches polling on or off.
    pub fn set_polling_active(&self, id: SessionId, active: bool) -> ModtapResult<()> {
        self.edit(id, SessionPatch::new().active(active))
    }

    /// Changes the polling interval. Zero stops polling.
    pub fn set_polling_interval(&self, id: SessionId, interval_ms: u64) -> ModtapResult<()> {
        self.edit(id, SessionPatch::new().interval_ms(interval_ms))
    }

    /// Changes the display format.
    pub fn set_display_format(&self, id: SessionId, format: DisplayFormat) -> ModtapResult<()> {
        self.edit(id, SessionPatch::new().display_format(format))
    }

    /// Renames a session.
    pub fn set_label(&self, id: SessionId, label: impl Into<String>) -> ModtapResult<()> {
        self.edit(id, SessionPatch::new().label(label))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads the session's block once, outside its polling cadence.
    ///
    /// The result is applied like a polled one and the updated snapshot is
    /// returned. A failed read is recorded on the session and returned.
    pub async fn poll_once(&self, id: SessionId) -> ModtapResult<Session> {
        self.scheduler.poll_once(id).await
    }

    /// Suspends polling without changing the session's polling settings.
    /// Returns `true` if a task was running.
    pub fn stop_polling(&self, id: SessionId) -> ModtapResult<bool> {
        Ok(self.scheduler.stop(id)?)
    }

    /// Restarts polling from the session's settings. Returns `true` if a
    /// task was started.
    pub fn resume_polling(&self, id: SessionId) -> ModtapResult<bool> {
        Ok(self.scheduler.sync(id)?)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Performs a single write.
    pub async fn write(&self, request: WriteRequest) -> ModtapResult<RegisterValue> {
        self.writer.write(request).await
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .field("establisher", &self.establisher)
            .finish()
    }
}
