// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use modtap_core::{
    ConnectionBus, ConnectionOutcome, ModtapError, SessionHealth, SessionManager, StaticSettings,
};
use modtap_modbus::ModbusGateway;

use crate::cli::{Cli, RunArgs};
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// How long a connect in progress may delay shutdown.
const ESTABLISHER_GRACE: Duration = Duration::from_secs(5);

/// Lower bound on the value report period.
const MIN_REPORT_PERIOD: Duration = Duration::from_millis(100);

/// Connects every configured device and reports polled values until
/// interrupted.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = modtap_config::load_config(&cli.config)
        .map_err(|e| BinError::from(e).with_context("Loading configuration"))?;

    if config.connections.is_empty() {
        return Err(BinError::config(format!(
            "no connections configured in {}",
            cli.config.display()
        )));
    }
    if args.dry_run {
        info!(
            connections = config.connections.len(),
            "Configuration loaded, dry run requested"
        );
        return Ok(());
    }

    let defaults = config.session_defaults();
    let report_period = args
        .report_every
        .map(Duration::from_secs)
        .unwrap_or_else(|| defaults.polling.interval())
        .max(MIN_REPORT_PERIOD);

    info!(
        connections = config.connections.len(),
        register_type = %defaults.register.register_type,
        start_address = defaults.register.start_address,
        count = defaults.register.count,
        interval_ms = defaults.polling.interval_ms,
        read_only = config.settings.read_only,
        "Starting modtap"
    );

    let gateway = Arc::new(ModbusGateway::new());
    let settings = Arc::new(StaticSettings::new(config.settings));
    let manager = Arc::new(SessionManager::new(gateway, settings, defaults));
    let shutdown = ShutdownCoordinator::new();

    let (bus, requests) = ConnectionBus::channel(config.connections.len());
    let mut outcomes = bus.subscribe();
    let establisher = {
        let manager = manager.clone();
        let token = shutdown.token();
        tokio::spawn(async move { manager.serve_connections(requests, token).await })
    };

    let expected = config.connections.len();
    for descriptor in config.connections {
        bus.request(descriptor).await.map_err(ModtapError::from)?;
    }
    drop(bus);

    let signals = shutdown.clone();
    tokio::spawn(async move { signals.wait_for_shutdown().await });

    let result = supervise(&manager, &shutdown, &mut outcomes, expected, report_period).await;

    shutdown.initiate_shutdown();
    if tokio::time::timeout(ESTABLISHER_GRACE, establisher).await.is_err() {
        warn!("Connection establisher did not stop in time");
    }
    manager.shutdown().await;

    let stats = manager.scheduler_stats();
    info!(
        polls_succeeded = stats.polls_succeeded,
        polls_failed = stats.polls_failed,
        ticks_skipped = stats.ticks_skipped,
        "modtap stopped"
    );
    result
}

/// Logs connection outcomes and periodic value reports until shutdown.
///
/// Fails if every connection request failed.
async fn supervise(
    manager: &SessionManager,
    shutdown: &ShutdownCoordinator,
    outcomes: &mut tokio::sync::broadcast::Receiver<ConnectionOutcome>,
    expected: usize,
    report_period: Duration,
) -> BinResult<()> {
    let mut shutdown_rx = shutdown.subscribe();
    let mut ticker = tokio::time::interval(report_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pending = expected;
    let mut connected = 0usize;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            outcome = outcomes.recv(), if pending > 0 => match outcome {
                Ok(ConnectionOutcome::Connected { session_id, label, .. }) => {
                    pending -= 1;
                    connected += 1;
                    info!(session_id = %session_id, label = %label, "Session opened");
                }
                Ok(ConnectionOutcome::Failed { error, .. }) => {
                    pending -= 1;
                    warn!(error = %error, "Connection request failed");
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Connection outcomes lagged");
                    pending = pending.saturating_sub(missed as usize);
                }
                Err(RecvError::Closed) => pending = 0,
            },
            _ = ticker.tick() => report(manager),
        }

        if pending == 0 && connected == 0 && manager.sessions().is_empty() {
            return Err(BinError::runtime("no device could be connected"));
        }
    }
}

fn report(manager: &SessionManager) {
    for session in manager.sessions() {
        match session.health {
            SessionHealth::Faulted | SessionHealth::Unusable => warn!(
                session_id = %session.id,
                label = %session.label,
                health = ?session.health,
                error = session.error.as_deref().unwrap_or("unknown"),
                "Polling error"
            ),
            SessionHealth::Idle => debug!(session_id = %session.id, label = %session.label, "Idle"),
            SessionHealth::Polling if session.last_polled_at.is_none() => {
                debug!(session_id = %session.id, label = %session.label, "Awaiting first poll")
            }
            SessionHealth::Polling => {
                let values = session
                    .rendered_values()
                    .into_iter()
                    .map(|(address, value)| format!("{address}={value}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                info!(
                    session_id = %session.id,
                    label = %session.label,
                    register_type = %session.register.register_type,
                    format = %session.display_format,
                    "{values}"
                );
            }
        }
    }
}
