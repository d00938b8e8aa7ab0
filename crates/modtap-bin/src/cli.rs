// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command line interface.
//!
//! - `run`: connect every configured device and poll until interrupted (default)
//! - `read`: connect one device and poll it once
//! - `write`: connect one device and write a single coil or register
//! - `validate`: check a configuration file
//! - `version`: show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Parser, Subcommand};

use modtap_core::display::DisplayFormat;
use modtap_core::transport::{Parity, RtuSettings, StopBits, TcpSettings, TransportDescriptor};
use modtap_core::types::RegisterType;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// modtap - multi-session Modbus poller
///
/// Opens Modbus TCP and RTU sessions, polls a register block on each and
/// performs single coil and register writes.
#[derive(Parser, Debug)]
#[command(
    name = "modtap",
    author = "Sylvex <contact@sylvex.io>",
    version = modtap_core::VERSION,
    about = "Multi-session Modbus TCP/RTU poller",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "modtap.yaml",
        env = "MODTAP_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, env = "MODTAP_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "MODTAP_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Connect every configured device and poll until interrupted
    ///
    /// This is the default command when no subcommand is given.
    Run(RunArgs),

    /// Connect one device, poll it once and print the values
    Read(ReadArgs),

    /// Connect one device and write a single coil or holding register
    Write(WriteArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Seconds between value reports (defaults to the polling interval)
    #[arg(long)]
    pub report_every: Option<u64>,

    /// Load and validate the configuration, then exit without connecting
    #[arg(long)]
    pub dry_run: bool,
}

/// Where to connect, shared by `read` and `write`.
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("target").required(true).args(["host", "serial"])))]
pub struct TargetArgs {
    /// Modbus TCP host
    #[arg(long)]
    pub host: Option<String>,

    /// Modbus TCP port
    #[arg(long, default_value_t = 502)]
    pub port: u16,

    /// Serial port path for Modbus RTU
    #[arg(long)]
    pub serial: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = 9600)]
    pub baud_rate: u32,

    /// Serial data bits
    #[arg(long, default_value_t = 8)]
    pub data_bits: u8,

    /// Serial parity (none, even, odd, mark, space)
    #[arg(long, default_value = "none")]
    pub parity: Parity,

    /// Serial stop bits (1, 1.5, 2)
    #[arg(long, default_value = "1")]
    pub stop_bits: StopBits,

    /// Slave (unit) id
    #[arg(short, long, default_value_t = 1)]
    pub slave: u8,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Connect attempts
    #[arg(long, default_value_t = 3)]
    pub retries: u8,
}

impl TargetArgs {
    /// Builds the transport descriptor.
    pub fn descriptor(&self) -> TransportDescriptor {
        let timeout = Duration::from_millis(self.timeout_ms);
        match (&self.host, &self.serial) {
            (Some(host), _) => TcpSettings::new(host.clone(), self.port)
                .with_slave_id(self.slave)
                .with_timeout(timeout)
                .with_retries(self.retries)
                .into(),
            (None, serial) => RtuSettings::new(serial.clone().unwrap_or_default())
                .with_baud_rate(self.baud_rate)
                .with_framing(self.data_bits, self.parity, self.stop_bits)
                .with_slave_id(self.slave)
                .with_timeout(timeout)
                .with_retries(self.retries)
                .into(),
        }
    }
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Connection target
    #[command(flatten)]
    pub target: TargetArgs,

    /// Register type (coil, discrete, holding, input)
    #[arg(short = 't', long, default_value = "holding")]
    pub register_type: RegisterType,

    /// First address
    #[arg(short, long, default_value_t = 0)]
    pub address: u16,

    /// Number of items
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: u16,

    /// Display format (decimal, hex, binary, float, int32, ascii)
    #[arg(short, long, default_value = "decimal")]
    pub format: DisplayFormat,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Connection target
    #[command(flatten)]
    pub target: TargetArgs,

    /// Register type (coil or holding)
    #[arg(short = 't', long, default_value = "holding")]
    pub register_type: RegisterType,

    /// Address to write
    #[arg(short, long)]
    pub address: u16,

    /// Value; coils treat any non-zero value as on
    #[arg(allow_negative_numbers = true)]
    pub value: i64,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<modtap_config::LogFormat> for LogFormat {
    fn from(format: modtap_config::LogFormat) -> Self {
        match format {
            modtap_config::LogFormat::Text => Self::Text,
            modtap_config::LogFormat::Compact => Self::Compact,
            modtap_config::LogFormat::Json => Self::Json,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parses arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the command to run, defaulting to `run`.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Resolves the log level from flags, falling back to `configured`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["modtap"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["modtap", "-c", "/etc/modtap/plant.yaml", "validate"]);
        assert_eq!(cli.config, PathBuf::from("/etc/modtap/plant.yaml"));
    }

    #[test]
    fn test_log_level_resolution() {
        let cli = Cli::parse_from(["modtap", "-l", "trace"]);
        assert_eq!(cli.effective_log_level("info"), "trace");

        let cli = Cli::parse_from(["modtap", "-q", "-l", "trace"]);
        assert_eq!(cli.effective_log_level("info"), "warn");

        let cli = Cli::parse_from(["modtap", "-v"]);
        assert_eq!(cli.effective_log_level("info"), "debug");
    }

    #[test]
    fn test_read_tcp() {
        let cli = Cli::parse_from([
            "modtap", "read", "--host", "10.0.0.5", "-s", "3", "-t", "coil", "-a", "100", "-n", "16",
            "-f", "hex",
        ]);
        let Some(Commands::Read(args)) = cli.command else {
            panic!("expected read");
        };
        assert_eq!(args.register_type, RegisterType::Coil);
        assert_eq!(args.address, 100);
        assert_eq!(args.count, 16);
        assert_eq!(args.format, DisplayFormat::Hex);

        let TransportDescriptor::Tcp(tcp) = args.target.descriptor() else {
            panic!("expected tcp");
        };
        assert_eq!(tcp.socket_addr(), "10.0.0.5:502");
        assert_eq!(tcp.slave_id, 3);
    }

    #[test]
    fn test_read_rtu_framing() {
        let cli = Cli::parse_from([
            "modtap", "read", "--serial", "/dev/ttyUSB0", "--baud-rate", "19200", "--parity", "even",
            "--stop-bits", "2",
        ]);
        let Some(Commands::Read(args)) = cli.command else {
            panic!("expected read");
        };
        let TransportDescriptor::Rtu(rtu) = args.target.descriptor() else {
            panic!("expected rtu");
        };
        assert_eq!(rtu.path, "/dev/ttyUSB0");
        assert_eq!(rtu.baud_rate, 19200);
        assert_eq!(rtu.parity, Parity::Even);
        assert_eq!(rtu.stop_bits, StopBits::Two);
    }

    #[test]
    fn test_read_requires_target() {
        assert!(Cli::try_parse_from(["modtap", "read"]).is_err());
        assert!(
            Cli::try_parse_from(["modtap", "read", "--host", "a", "--serial", "/dev/ttyS0"]).is_err()
        );
    }

    #[test]
    fn test_write_negative_value_parses() {
        let cli = Cli::parse_from(["modtap", "write", "--host", "plc", "-a", "7", "-1"]);
        let Some(Commands::Write(args)) = cli.command else {
            panic!("expected write");
        };
        assert_eq!(args.address, 7);
        assert_eq!(args.value, -1);
    }
}
