// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::error::BinResult;

/// Prints version information.
pub fn version() -> BinResult<()> {
    println!("modtap - multi-session Modbus TCP/RTU poller");
    println!();
    println!("Version Information:");
    println!("  modtap-bin:    {}", env!("CARGO_PKG_VERSION"));
    println!("  modtap-core:   {}", modtap_core::VERSION);
    println!("  modtap-modbus: {}", modtap_modbus::VERSION);
    println!("  modtap-config: {}", modtap_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:        {}", std::env::consts::ARCH);
    println!("  OS:            {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
