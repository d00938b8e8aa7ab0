// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! The coordinator turns Ctrl-C or SIGTERM into a single broadcast that the
//! polling reporter and the connection establisher both observe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates shutdown across the tasks of the `run` command.
///
/// ```ignore
/// let coordinator = ShutdownCoordinator::new();
/// let token = coordinator.token();
/// tokio::spawn(async move { token.cancelled().await; });
/// coordinator.wait_for_shutdown().await;
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    initiated: Arc<AtomicBool>,
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Creates a coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            initiated: Arc::new(AtomicBool::new(false)),
            token: CancellationToken::new(),
        }
    }

    /// Subscribes to the shutdown broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Returns a token cancelled when shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Starts shutdown. Only the first call notifies subscribers.
    pub fn initiate_shutdown(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            self.token.cancel();
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once shutdown has started.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Waits for Ctrl-C, SIGTERM or a manual [`initiate_shutdown`], then
    /// initiates shutdown.
    ///
    /// [`initiate_shutdown`]: ShutdownCoordinator::initiate_shutdown
    pub async fn wait_for_shutdown(&self) {
        if self.is_shutdown_initiated() {
            return;
        }

        tokio::select! {
            _ = os_signal() => {}
            _ = self.token.cancelled() => {}
        }
        self.initiate_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "Failed to register SIGTERM handler");
            ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn os_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use modtap_core::{ConnectionBus, SessionManager, StaticSettings};
    use modtap_modbus::ModbusGateway;

    use super::*;

    #[tokio::test]
    async fn test_tokens_from_clones_cancel_together() {
        let coordinator = ShutdownCoordinator::new();
        let reporter = coordinator.clone();
        let mut rx = reporter.subscribe();
        let tokens = [coordinator.token(), reporter.token()];

        reporter.initiate_shutdown();
        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_connection_establisher() {
        let coordinator = ShutdownCoordinator::new();
        let manager = SessionManager::new(
            Arc::new(ModbusGateway::new()),
            Arc::new(StaticSettings::default()),
            Default::default(),
        );
        // the bus stays alive, so only the token can end the loop
        let (_bus, requests) = ConnectionBus::channel(1);

        let serve = manager.serve_connections(requests, coordinator.token());
        let stop = async {
            tokio::task::yield_now().await;
            coordinator.initiate_shutdown();
        };
        let joined = tokio::time::timeout(Duration::from_secs(1), async { tokio::join!(serve, stop) });
        assert!(joined.await.is_ok());
        assert!(manager.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_wait_returns_after_manual_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let waiter = coordinator.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_shutdown().await });

        coordinator.initiate_shutdown();
        let finished = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(matches!(finished, Ok(Ok(()))));
    }
}
