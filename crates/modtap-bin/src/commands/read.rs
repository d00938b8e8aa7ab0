// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use std::sync::Arc;

use modtap_core::{
    ModtapError, PollingConfig, RegisterConfig, SessionDefaults, SessionManager, StaticSettings,
};
use modtap_modbus::ModbusGateway;

use crate::cli::{OutputFormat, ReadArgs};
use crate::error::{BinError, BinResult};

/// Connects, polls the requested block once and prints it.
pub async fn read(args: ReadArgs) -> BinResult<()> {
    let register = RegisterConfig::new(args.register_type.clone(), args.address, args.count);
    register.validate().map_err(ModtapError::from)?;
    // refuse before opening a link the read could never use
    args.register_type.read_function().map_err(ModtapError::from)?;

    let defaults = SessionDefaults {
        register,
        display_format: args.format,
        polling: PollingConfig {
            active: false,
            ..PollingConfig::default()
        },
    };
    let manager = SessionManager::new(
        Arc::new(ModbusGateway::new()),
        Arc::new(StaticSettings::default()),
        defaults,
    );

    let established = manager.connect(args.target.descriptor()).await?;
    let result = manager.poll_once(established.session_id).await;
    manager.shutdown().await;

    let session = result?;
    let plan = session.read_plan();
    let rendered = session.display_format.render_block(&session.values);

    match args.output {
        OutputFormat::Text => {
            println!(
                "{} slave {} {} {}..{}",
                session.label,
                plan.slave_id,
                plan.register_type.full_name(),
                plan.start_address,
                u32::from(plan.start_address) + u32::from(plan.count) - 1,
            );
            for (address, value) in &rendered {
                println!("  {address:>5}  {value}");
            }
        }
        OutputFormat::Json => {
            let values: Vec<_> = rendered
                .iter()
                .map(|(address, value)| serde_json::json!({ "address": address, "value": value }))
                .collect();
            let output = serde_json::json!({
                "target": session.label,
                "slave_id": plan.slave_id,
                "register_type": plan.register_type.as_str(),
                "display_format": session.display_format.as_str(),
                "values": values,
            });
            let text = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(e.to_string()))?;
            println!("{text}");
        }
    }

    Ok(())
}
