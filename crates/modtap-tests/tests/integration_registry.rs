// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Session Registry Integration Tests
//!
//! Session lifecycle and the active-session pointer, exercised through the
//! session manager.

use std::time::Duration;

use modtap_core::{
    ModtapError, RegisterConfig, RegisterType, SessionConfig, SessionError, SessionId,
    SessionPatch, SessionUpdate, ValidationError,
};
use modtap_tests::prelude::*;

// =============================================================================
// Create and Remove
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_sessions_listed_in_id_order() {
    let harness = TestHarness::new(SessionFixtures::paused());
    for n in 1..=3 {
        harness.connect(TransportFixtures::tcp_numbered(n)).await;
    }

    let ids: Vec<u32> = harness.manager.sessions().iter().map(|s| s.id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(harness.manager.registry().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_id_rejected() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let established = harness.connect(TransportFixtures::tcp_plc()).await;
    let existing = harness.session(established.session_id);

    let config = SessionConfig::new(TransportFixtures::tcp_plc(), existing.handle);
    let result = harness.manager.registry().create(established.session_id, config);

    assert!(matches!(result, Err(SessionError::AlreadyExists { .. })));
    assert_eq!(harness.manager.registry().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_session_not_found() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let missing = SessionId::new(42);

    assert!(matches!(
        harness.manager.session(missing),
        Err(ModtapError::Session(SessionError::NotFound { .. }))
    ));
    assert!(matches!(
        harness.manager.close(missing).await,
        Err(ModtapError::Session(SessionError::NotFound { .. }))
    ));
    assert!(matches!(
        harness.manager.set_label(missing, "x"),
        Err(ModtapError::Session(SessionError::NotFound { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_close_releases_connection() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;
    let handle = harness.session(id).handle;
    assert!(harness.gateway.is_open(handle));

    harness.manager.close(id).await.unwrap();

    assert!(!harness.gateway.is_open(handle));
    assert!(!harness.manager.registry().contains(id));
    assert!(harness.manager.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_everything() {
    let harness = TestHarness::new(SessionFixtures::holding(0, 2, 1000));
    for n in 1..=4 {
        harness.connect(TransportFixtures::tcp_numbered(n)).await;
    }
    harness.advance(Duration::from_millis(10)).await;

    harness.manager.shutdown().await;
    harness.advance(Duration::from_millis(5000)).await;

    assert!(harness.manager.sessions().is_empty());
    assert_eq!(harness.gateway.open_count(), 0);
    assert_eq!(harness.gateway.close_count(), 4);
    assert_eq!(harness.gateway.read_count(), 4);
    assert_eq!(harness.manager.active_id(), None);
}

// =============================================================================
// Active Session
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_newest_session_becomes_active() {
    let harness = TestHarness::new(SessionFixtures::paused());
    for n in 1..=3 {
        harness.connect(TransportFixtures::tcp_numbered(n)).await;
    }
    assert_eq!(harness.manager.active_id(), Some(SessionId::new(3)));
}

#[tokio::test(start_paused = true)]
async fn test_closing_active_session_reassigns_lowest_id() {
    let harness = TestHarness::new(SessionFixtures::paused());
    for n in 1..=3 {
        harness.connect(TransportFixtures::tcp_numbered(n)).await;
    }

    harness.manager.close(SessionId::new(3)).await.unwrap();
    assert_eq!(harness.manager.active_id(), Some(SessionId::new(1)));

    // closing a non-active session leaves the pointer alone
    harness.manager.close(SessionId::new(2)).await.unwrap();
    assert_eq!(harness.manager.active_id(), Some(SessionId::new(1)));

    harness.manager.close(SessionId::new(1)).await.unwrap();
    assert_eq!(harness.manager.active_id(), None);
}

#[tokio::test(start_paused = true)]
async fn test_set_active() {
    let harness = TestHarness::new(SessionFixtures::paused());
    harness.connect(TransportFixtures::tcp_numbered(1)).await;
    harness.connect(TransportFixtures::tcp_numbered(2)).await;

    harness.manager.set_active(Some(SessionId::new(1))).unwrap();
    assert_eq!(harness.manager.active_id(), Some(SessionId::new(1)));

    let err = harness.manager.set_active(Some(SessionId::new(9))).unwrap_err();
    assert!(matches!(err, SessionError::NotFound { .. }));
    assert_eq!(harness.manager.active_id(), Some(SessionId::new(1)));

    harness.manager.set_active(None).unwrap();
    assert_eq!(harness.manager.active_id(), None);
}

// =============================================================================
// Edits
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_invalid_edit_leaves_session_unchanged() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;
    let before = harness.session(id);

    let err = harness
        .manager
        .update_register_config(id, RegisterConfig::new(RegisterType::HoldingRegister, 0, 126))
        .unwrap_err();
    assert!(matches!(
        err,
        ModtapError::Validation(ValidationError::OutOfRange { .. })
    ));

    let err = harness
        .manager
        .update_register_config(id, RegisterConfig::new(RegisterType::Coil, 65_530, 10))
        .unwrap_err();
    assert!(matches!(err, ModtapError::Validation(_)));

    let err = harness.manager.set_label(id, "   ").unwrap_err();
    assert!(matches!(err, ModtapError::Validation(_)));

    assert_eq!(harness.session(id), before);
}

#[tokio::test(start_paused = true)]
async fn test_bit_types_allow_larger_blocks() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;

    harness
        .manager
        .update_register_config(id, RegisterConfig::new(RegisterType::DiscreteInput, 0, 2000))
        .unwrap();

    let session = harness.session(id);
    assert_eq!(session.register.register_type, RegisterType::DiscreteInput);
    assert_eq!(session.register.count, 2000);
}

#[tokio::test(start_paused = true)]
async fn test_combined_patch_applies_all_fields() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;

    harness
        .manager
        .edit(
            id,
            SessionPatch::new()
                .start_address(40)
                .count(4)
                .slave_id(7)
                .interval_ms(250)
                .label("Chiller"),
        )
        .unwrap();

    let session = harness.session(id);
    assert_eq!(session.register.start_address, 40);
    assert_eq!(session.register.count, 4);
    assert_eq!(session.slave_id(), 7);
    assert_eq!(session.polling.interval_ms, 250);
    assert!(!session.polling.active);
    assert_eq!(session.label, "Chiller");
}

#[tokio::test(start_paused = true)]
async fn test_stale_scheduler_update_rejected() {
    let harness = TestHarness::new(SessionFixtures::holding(0, 2, 1000));
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;
    let old_generation = harness.session(id).generation;

    harness.manager.set_polling_interval(id, 500).unwrap();
    assert!(harness.session(id).generation > old_generation);

    let err = harness
        .manager
        .registry()
        .update(
            id,
            SessionUpdate::PollFailed {
                generation: old_generation,
                error: "late".to_string(),
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ModtapError::Session(SessionError::Stale { .. })
    ));
    assert_eq!(harness.session(id).error, None);
}
