// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Write Coordinator Integration Tests
//!
//! Single writes: value mapping, pre-dispatch validation, and separation
//! of write errors from the polling error channel.

use std::time::Duration;

use modtap_core::{
    ModtapError, RegisterConfig, RegisterType, RegisterValue, SessionId, TransportError, ValidationError, Value,
    WriteRequest,
};
use modtap_tests::prelude::*;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_coil_write_maps_nonzero_to_on() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;

    let written = harness
        .manager
        .write(WriteRequest::new(id, 3, RegisterType::Coil, 5))
        .await
        .unwrap();
    assert_eq!(written, RegisterValue::bit(3, true));

    harness
        .manager
        .write(WriteRequest::new(id, 4, RegisterType::Coil, 0))
        .await
        .unwrap();

    let history = harness.gateway.write_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].address, 3);
    assert_eq!(history[0].value, Value::Bit(true));
    assert_eq!(history[1].value, Value::Bit(false));
}

#[tokio::test(start_paused = true)]
async fn test_register_write_uses_session_slave() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::rtu_meter()).await.session_id;

    let written = harness
        .manager
        .write(WriteRequest::new(id, 100, RegisterType::HoldingRegister, 65_535))
        .await
        .unwrap();

    assert_eq!(written, RegisterValue::word(100, 65_535));
    let call = harness.gateway.write_history().pop().unwrap();
    assert_eq!(call.slave_id, 5);
    assert_eq!(call.handle, harness.session(id).handle);
    assert_eq!(call.value, Value::Word(65_535));
}

#[tokio::test(start_paused = true)]
async fn test_written_value_seen_by_next_poll() {
    let harness = TestHarness::new(SessionFixtures::holding(0, 3, 1000));
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;
    harness.advance(ms(10)).await;
    assert_eq!(harness.session(id).values, RegisterValue::words(0, [0, 0, 0]));

    harness
        .manager
        .write(WriteRequest::new(id, 1, RegisterType::HoldingRegister, 1234))
        .await
        .unwrap();
    // the write itself does not touch the snapshot
    assert_eq!(harness.session(id).values, RegisterValue::words(0, [0, 0, 0]));

    harness.advance(ms(1000)).await;
    assert_eq!(harness.session(id).values, RegisterValue::words(0, [0, 1234, 0]));
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_out_of_range_register_value_rejected() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;

    for value in [70_000, -1] {
        let err = harness
            .manager
            .write(WriteRequest::new(id, 0, RegisterType::HoldingRegister, value))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModtapError::Validation(ValidationError::OutOfRange { .. })
        ));
    }

    assert_eq!(harness.gateway.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_read_only_types_never_reach_gateway() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;

    for register_type in [RegisterType::DiscreteInput, RegisterType::InputRegister] {
        let err = harness
            .manager
            .write(WriteRequest::new(id, 0, register_type, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModtapError::Validation(ValidationError::ReadOnly { .. })
        ));
    }

    let err = harness
        .manager
        .write(WriteRequest::new(id, 0, RegisterType::parse("analog"), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ModtapError::Configuration(_)));

    assert_eq!(harness.gateway.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_input_session_rejects_writable_request_types() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;
    harness
        .manager
        .update_register_config(id, RegisterConfig::new(RegisterType::InputRegister, 0, 2))
        .unwrap();

    for register_type in [RegisterType::HoldingRegister, RegisterType::Coil] {
        let err = harness
            .manager
            .write(WriteRequest::new(id, 0, register_type, 42))
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            ModtapError::Validation(ValidationError::ReadOnly { register_type })
                if register_type == "input"
        ));
    }
    assert_eq!(harness.gateway.write_count(), 0);

    // switching back to a writable type lifts the restriction
    harness
        .manager
        .update_register_config(id, RegisterConfig::new(RegisterType::HoldingRegister, 0, 2))
        .unwrap();
    harness
        .manager
        .write(WriteRequest::new(id, 0, RegisterType::HoldingRegister, 42))
        .await
        .unwrap();
    assert_eq!(harness.gateway.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_read_only_setting_blocks_writes() {
    let harness = TestHarness::new(SessionFixtures::paused());
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;
    harness.settings.set_read_only(true);

    let err = harness
        .manager
        .write(WriteRequest::new(id, 0, RegisterType::Coil, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ModtapError::Validation(ValidationError::WritesDisabled)
    ));
    assert_eq!(harness.gateway.write_count(), 0);

    harness.settings.set_read_only(false);
    harness
        .manager
        .write(WriteRequest::new(id, 0, RegisterType::Coil, 1))
        .await
        .unwrap();
    assert_eq!(harness.gateway.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_write_to_unknown_session() {
    let harness = TestHarness::new(SessionFixtures::paused());

    let err = harness
        .manager
        .write(WriteRequest::new(SessionId::new(7), 0, RegisterType::Coil, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, ModtapError::Session(_)));
    assert_eq!(err.user_message(), "Connection #7 is no longer open");
    assert_eq!(harness.gateway.write_count(), 0);
}

// =============================================================================
// Error Channels
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_write_failure_leaves_polling_error_alone() {
    let harness = TestHarness::new(SessionFixtures::holding(0, 2, 1000));
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;
    harness.advance(ms(10)).await;
    harness.gateway.fail_writes(true);

    let err = harness
        .manager
        .write(WriteRequest::new(id, 0, RegisterType::HoldingRegister, 9))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ModtapError::Transport(TransportError::Exception { .. })
    ));

    let session = harness.session(id);
    assert_eq!(session.error, None);
    assert_eq!(session.health, modtap_core::SessionHealth::Polling);
}

#[tokio::test(start_paused = true)]
async fn test_polling_error_survives_successful_write() {
    let harness = TestHarness::new(SessionFixtures::holding(0, 2, 1000));
    let id = harness.connect(TransportFixtures::tcp_plc()).await.session_id;
    harness.gateway.fail_next_read();
    harness.advance(ms(10)).await;
    let polling_error = harness.session(id).error;
    assert!(polling_error.is_some());

    harness
        .manager
        .write(WriteRequest::new(id, 0, RegisterType::Coil, 1))
        .await
        .unwrap();

    assert_eq!(harness.session(id).error, polling_error);
}
