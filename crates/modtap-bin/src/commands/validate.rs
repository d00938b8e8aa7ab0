// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::collections::HashSet;

use modtap_config::ModtapConfig;
use modtap_core::TransportDescriptor;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Loads and validates the configuration file, then prints a summary.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = modtap_config::load_config(config_path)
        .map_err(|e| BinError::config(format!("Configuration validation failed: {}", e)))?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Connections:   {}", config.connections.len());
            for connection in &config.connections {
                println!(
                    "    - {} {} (slave {})",
                    connection.kind(),
                    connection.label(),
                    connection.slave_id()
                );
            }
            println!(
                "  Register:      {} {}+{}",
                config.register.register_type,
                config.register.start_address,
                config.register.count
            );
            println!("  Display:       {}", config.register.display_format);
            println!(
                "  Polling:       {} ms ({})",
                config.polling.interval_ms,
                if config.polling.active { "active" } else { "paused" }
            );
            println!(
                "  Writes:        {}",
                if config.settings.read_only { "disabled" } else { "enabled" }
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ! {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "connection_count": config.connections.len(),
                    "register_type": config.register.register_type.as_str(),
                    "start_address": config.register.start_address,
                    "count": config.register.count,
                    "interval_ms": config.polling.interval_ms,
                    "polling_active": config.polling.active,
                    "read_only": config.settings.read_only,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let text = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(e.to_string()))?;
            println!("{text}");
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Flags settings that load fine but are probably not what was meant.
pub fn collect_warnings(config: &ModtapConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.connections.is_empty() {
        warnings.push("No connections configured".to_string());
    }
    if !config.polling.active {
        warnings.push("Polling is paused for new sessions".to_string());
    }

    let mut labels = HashSet::new();
    for connection in &config.connections {
        let label = connection.label();
        if !labels.insert(label.clone()) {
            let what = match connection {
                TransportDescriptor::Tcp(_) => "endpoint",
                TransportDescriptor::Rtu(_) => "serial port",
            };
            warnings.push(format!("{} {} is configured more than once", what, label));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use modtap_core::{RtuSettings, TcpSettings};

    #[test]
    fn test_no_warnings_for_plain_config() {
        let config = ModtapConfig {
            connections: vec![TcpSettings::new("plc", 502).into()],
            ..Default::default()
        };
        assert!(collect_warnings(&config).is_empty());
    }

    #[test]
    fn test_warnings() {
        let mut config = ModtapConfig {
            connections: vec![
                RtuSettings::new("/dev/ttyUSB0").into(),
                RtuSettings::new("/dev/ttyUSB0").with_slave_id(2).into(),
            ],
            ..Default::default()
        };
        config.polling.active = false;

        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[1].contains("serial port /dev/ttyUSB0"));

        assert_eq!(collect_warnings(&ModtapConfig::default()).len(), 1);
    }
}
