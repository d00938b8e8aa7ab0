// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Connection Establisher Integration Tests
//!
//! Connects, session id allocation, and requests arriving over the
//! connection bus.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use modtap_core::{
    ConnectionBus, ConnectionEstablisher, ConnectionHandle, ConnectionOutcome, ModtapError,
    PollingScheduler, SessionConfig, SessionHealth, SessionId, SessionRegistry, TransportError,
    ValidationError,
};
use modtap_tests::prelude::*;

// =============================================================================
// Direct Connects
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_new_session_takes_defaults_and_polls() {
    let harness = TestHarness::new(SessionFixtures::holding(10, 4, 500));
    harness.gateway.set_words(10, [1, 2, 3, 4]);

    let established = harness.connect(TransportFixtures::tcp_plc()).await;
    assert_eq!(established.session_id, SessionId::new(1));
    assert_eq!(established.label, "192.168.1.10:502");
    assert_eq!(harness.manager.active_id(), Some(established.session_id));

    harness.advance(Duration::from_millis(10)).await;

    let session = harness.session(established.session_id);
    assert_eq!(session.label, "192.168.1.10:502");
    assert_eq!(session.register.start_address, 10);
    assert_eq!(session.register.count, 4);
    assert_eq!(session.polling.interval_ms, 500);
    assert_eq!(session.health, SessionHealth::Polling);
    assert_eq!(session.values.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_rtu_label_is_port_path() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let established = harness.connect(TransportFixtures::rtu_meter()).await;

    assert_eq!(established.label, "/dev/ttyUSB0");
    let session = harness.session(established.session_id);
    assert_eq!(session.slave_id(), 5);
    assert_eq!(session.health, SessionHealth::Idle);
    assert_eq!(harness.gateway.read_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ids_are_never_reused() {
    let harness = TestHarness::new(SessionFixtures::paused());
    for n in 1..=3 {
        harness.connect(TransportFixtures::tcp_numbered(n)).await;
    }
    harness.manager.close(SessionId::new(2)).await.unwrap();
    harness.manager.close(SessionId::new(3)).await.unwrap();

    let next = harness.connect(TransportFixtures::tcp_numbered(9)).await;
    assert_eq!(next.session_id, SessionId::new(4));
}

#[tokio::test(start_paused = true)]
async fn test_failed_connect_registers_nothing() {
    let harness = TestHarness::new(SessionFixtures::paused());
    harness
        .gateway
        .fail_connect(Some(ModtapError::Transport(TransportError::connection_failed(
            "192.168.1.10:502",
            "connection refused",
        ))));

    let err = harness
        .manager
        .connect(TransportFixtures::tcp_plc())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ModtapError::Transport(TransportError::ConnectionFailed { .. })
    ));
    assert!(harness.manager.sessions().is_empty());
    assert_eq!(harness.manager.active_id(), None);

    // the failed attempt did not consume an id
    harness.gateway.fail_connect(None);
    let established = harness.connect(TransportFixtures::tcp_plc()).await;
    assert_eq!(established.session_id, SessionId::new(1));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_descriptor_never_reaches_gateway() {
    let harness = TestHarness::new(SessionFixtures::paused());

    let err = harness
        .manager
        .connect(TransportFixtures::tcp_invalid_port())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ModtapError::Validation(ValidationError::OutOfRange { .. })
    ));
    assert_eq!(harness.gateway.connect_count(), 0);
    assert!(harness.manager.sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_closed_before_activation() {
    let gateway = Arc::new(MockGateway::new());
    let registry = Arc::new(SessionRegistry::new());
    let scheduler = PollingScheduler::new(registry.clone(), gateway.clone());
    let establisher = ConnectionEstablisher::new(
        registry.clone(),
        scheduler.clone(),
        gateway.clone(),
        SessionFixtures::holding(0, 2, 1000),
    );

    let kept = SessionId::new(1);
    registry
        .create(
            kept,
            SessionConfig::new(TransportFixtures::tcp_plc(), ConnectionHandle::new(1)),
        )
        .unwrap();
    assert!(establisher.activate(kept).unwrap());

    // registered, then closed by someone else before activation
    let closed = SessionId::new(2);
    registry
        .create(
            closed,
            SessionConfig::new(TransportFixtures::tcp_plc(), ConnectionHandle::new(2)),
        )
        .unwrap();
    registry.remove(closed).unwrap();

    assert!(!establisher.activate(closed).unwrap());
    assert_eq!(registry.active_id(), Some(kept));
    assert_eq!(scheduler.stats().tasks_started, 1);
}

// =============================================================================
// Connection Bus
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_bus_requests_produce_correlated_outcomes() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let (bus, requests) = ConnectionBus::channel(8);
    let mut outcomes = bus.subscribe();

    let good = bus.request(TransportFixtures::tcp_plc()).await.unwrap();
    let bad = bus
        .request(TransportFixtures::tcp_invalid_port())
        .await
        .unwrap();
    let rtu = bus.request(TransportFixtures::rtu_meter()).await.unwrap();
    assert_eq!(bus.stats().requests_sent, 3);
    drop(bus);

    // returns once the queue is drained and every sender is gone
    harness
        .manager
        .serve_connections(requests, CancellationToken::new())
        .await;

    let first = outcomes.recv().await.unwrap();
    assert_eq!(
        first,
        ConnectionOutcome::Connected {
            request_id: good,
            session_id: SessionId::new(1),
            label: "192.168.1.10:502".to_string(),
        }
    );

    let second = outcomes.recv().await.unwrap();
    assert_eq!(second.request_id(), bad);
    assert!(!second.is_connected());

    let third = outcomes.recv().await.unwrap();
    assert_eq!(third.request_id(), rtu);
    assert!(matches!(
        third,
        ConnectionOutcome::Connected { session_id, .. } if session_id == SessionId::new(2)
    ));

    assert_eq!(harness.manager.sessions().len(), 2);
    assert_eq!(harness.manager.active_id(), Some(SessionId::new(2)));
}

#[tokio::test(start_paused = true)]
async fn test_bus_stops_on_shutdown() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let (bus, requests) = ConnectionBus::channel(8);
    let shutdown = CancellationToken::new();

    let stopper = {
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
        }
    };
    tokio::join!(
        harness.manager.serve_connections(requests, shutdown.clone()),
        stopper
    );

    // the queue is closed once the establisher has stopped
    assert!(bus.request(TransportFixtures::tcp_plc()).await.is_err());
    assert!(harness.manager.sessions().is_empty());
}
