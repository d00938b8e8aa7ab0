// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! modtap - multi-session Modbus TCP/RTU poller.

use modtap_bin::error::report_error_and_exit;
use modtap_bin::{commands, init_logging, logging, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let configured = logging::configured(&cli.config);
    let level = cli.effective_log_level(configured.level.as_str()).to_string();
    let format = cli.log_format.unwrap_or_else(|| configured.format.into());
    init_logging(&level, format);

    if let Err(e) = commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
