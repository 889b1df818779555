//! Entrypoint for the swap aggregator CLI

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]
#![deny(clippy::uninlined_format_args)]

use aggregator_engine::{
    ledger::fixture::LedgerFixture, telemetry::setup_logging, EngineConfig, SwapEngine,
};
use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::cli::Cli;

mod cli;

/// Main entrypoint for the swap aggregator
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.json_logs);

    let config = EngineConfig::from_file(&cli.config).context("loading engine config")?;
    let ledger = LedgerFixture::from_file(&cli.ledger)
        .and_then(|fixture| fixture.build())
        .context("loading ledger fixture")?;
    info!(
        engine_account = %config.engine_account,
        route_policy = %config.platform.route_policy,
        "Starting swap aggregator"
    );

    let engine = SwapEngine::new(&config, ledger)?;
    let output = cli.command.run(&engine).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
