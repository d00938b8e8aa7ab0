// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod read;
mod run;
mod validate;
mod version;
mod write;

pub use read::read;
pub use run::run;
pub use validate::{collect_warnings, validate};
pub use version::version;
pub use write::write;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the command selected on the command line.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Read(args) => read::read(args).await,
        Commands::Write(args) => write::write(args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(),
    }
}
