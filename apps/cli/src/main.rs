//! leadgen CLI: find marketing agencies, enrich them and draft outreach.
//!
//! Runs the discovery → enrichment → contact → outreach → scoring pipeline
//! and writes the scored leads to CSV or JSON Lines.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::run(cli).await
}
