// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Turns transport descriptors into live sessions.
//!
//! The establisher validates the descriptor, connects through the gateway,
//! and only after a successful connect allocates a session id from a
//! monotonic counter. Ids are never reused, even after sessions are closed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{ConnectionOutcome, ConnectionRequested, ConnectionRequests};
use crate::display::DisplayFormat;
use crate::error::{ModtapResult, SessionError};
use crate::gateway::DeviceGateway;
use crate::registry::SessionRegistry;
use crate::scheduler::PollingScheduler;
use crate::session::{PollingConfig, RegisterConfig, SessionConfig};
use crate::transport::TransportDescriptor;
use crate::types::SessionId;

/// Register block, format and cadence given to new sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDefaults {
    /// Register block.
    pub register: RegisterConfig,
    /// Display format.
    pub display_format: DisplayFormat,
    /// Polling cadence.
    pub polling: PollingConfig,
}

/// A session created by the establisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Established {
    /// The new session id.
    pub session_id: SessionId,
    /// Display label (`host:port` or the serial path).
    pub label: String,
}

/// Connects devices and registers the resulting sessions.
pub struct ConnectionEstablisher {
    registry: Arc<SessionRegistry>,
    scheduler: PollingScheduler,
    gateway: Arc<dyn DeviceGateway>,
    defaults: SessionDefaults,
    next_id: AtomicU32,
}

impl ConnectionEstablisher {
    /// Creates an establisher. The first session gets id 1.
    pub fn new(
        registry: Arc<SessionRegistry>,
        scheduler: PollingScheduler,
        gateway: Arc<dyn DeviceGateway>,
        defaults: SessionDefaults,
    ) -> Self {
        Self {
            registry,
            scheduler,
            gateway,
            defaults,
            next_id: AtomicU32::new(1),
        }
    }

    /// Returns the defaults applied to new sessions.
    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    /// Connects and registers a session, makes it active and starts polling.
    ///
    /// On failure nothing is registered and no id is consumed.
    pub async fn establish(&self, descriptor: TransportDescriptor) -> ModtapResult<Established> {
        descriptor.validate()?;

        let label = descriptor.label();
        debug!(endpoint = %label, transport = descriptor.kind(), "Connecting");

        let connected = match &descriptor {
            TransportDescriptor::Tcp(settings) => self.gateway.connect_tcp(settings).await,
            TransportDescriptor::Rtu(settings) => self.gateway.connect_rtu(settings).await,
        };
        let handle = match connected {
            Ok(handle) => handle,
            Err(e) => {
                warn!(endpoint = %label, error = %e, "Connection failed");
                return Err(e);
            }
        };

        let session_id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let config = SessionConfig {
            register: self.defaults.register.clone(),
            display_format: self.defaults.display_format,
            polling: self.defaults.polling,
            ..SessionConfig::new(descriptor, handle)
        };

        if let Err(e) = self.registry.create(session_id, config) {
            // unreachable with a monotonic counter, but don't leak the link
            let _ = self.gateway.close(handle).await;
            return Err(e.into());
        }
        self.activate(session_id)?;

        info!(session_id = %session_id, label = %label, %handle, "Connected");
        Ok(Established { session_id, label })
    }

    /// Makes a freshly registered session active and starts its polling.
    ///
    /// Returns `false` if the session was closed before it could be
    /// activated; the connect still counts as successful.
    pub fn activate(&self, id: SessionId) -> Result<bool, SessionError> {
        let activated = self
            .registry
            .set_active_id(Some(id))
            .and_then(|()| self.scheduler.sync(id));
        match activated {
            Ok(_) => Ok(true),
            Err(SessionError::NotFound { .. }) => {
                debug!(session_id = %id, "Session closed before activation");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Handles one bus request and builds its outcome.
    pub async fn handle(&self, request: ConnectionRequested) -> ConnectionOutcome {
        let ConnectionRequested {
            request_id,
            descriptor,
        } = request;
        match self.establish(descriptor).await {
            Ok(Established { session_id, label }) => ConnectionOutcome::Connected {
                request_id,
                session_id,
                label,
            },
            Err(e) => ConnectionOutcome::Failed {
                request_id,
                error: e.user_message(),
            },
        }
    }

    /// Serves bus requests until every sender is gone or `shutdown` fires.
    ///
    /// Requests are handled one at a time, in arrival order.
    pub async fn run(&self, mut requests: ConnectionRequests, shutdown: CancellationToken) {
        info!("Connection establisher started");
        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            let outcome = self.handle(request).await;
            requests.publish(outcome);
        }
        requests.close();
        info!("Connection establisher stopped");
    }
}

impl std::fmt::Debug for ConnectionEstablisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionEstablisher")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
