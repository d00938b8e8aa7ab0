// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use std::sync::Arc;

use modtap_core::{
    ModtapError, PollingConfig, SessionDefaults, SessionManager, StaticSettings, ValidationError,
    WriteRequest,
};
use modtap_modbus::ModbusGateway;

use crate::cli::WriteArgs;
use crate::error::BinResult;

/// Connects and performs one write.
pub async fn write(args: WriteArgs) -> BinResult<()> {
    // refuse before opening a link the write could never use
    if args.register_type.is_read_only() {
        return Err(ModtapError::from(ValidationError::read_only(&args.register_type)).into());
    }

    let defaults = SessionDefaults {
        polling: PollingConfig {
            active: false,
            ..PollingConfig::default()
        },
        ..SessionDefaults::default()
    };
    let manager = SessionManager::new(
        Arc::new(ModbusGateway::new()),
        Arc::new(StaticSettings::default()),
        defaults,
    );

    let established = manager.connect(args.target.descriptor()).await?;
    let request = WriteRequest::new(
        established.session_id,
        args.address,
        args.register_type.clone(),
        args.value,
    );
    let result = manager.write(request).await;
    manager.shutdown().await;

    let written = result?;
    println!(
        "{} {} {} <- {}",
        established.label,
        args.register_type.full_name(),
        written.address,
        written.value
    );
    Ok(())
}
