mod bootstrap_helpers;
mod commands;

use anyhow::Result;
use clap::Parser;
use courier_cli::{normalize_legacy_archive_flags, Cli};

use crate::bootstrap_helpers::init_tracing;
use crate::commands::run_cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_legacy_archive_flags(std::env::args().collect()));
    init_tracing(cli.log_level);
    run_cli(cli).await
}
