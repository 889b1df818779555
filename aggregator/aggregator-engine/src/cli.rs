//! Defines the command-line arguments and the commands they run

use std::path::PathBuf;

use aggregator_api::{
    execution::ExecutionRequest,
    metadata::SwapMetadata,
    quote::{QuoteRequest, QuoteResponse},
};
use aggregator_engine::{
    swap::types::{SwapReceipt, SwapRequest},
    SwapEngine,
};
use alloy_primitives::{Address, B256, U256};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

/// The CLI for the swap aggregator
#[rustfmt::skip]
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // --- Environment --- //
    /// The path to the engine config file
    #[clap(long, env = "AGGREGATOR_CONFIG")]
    pub config: PathBuf,
    /// The path to the ledger fixture the engine settles against
    #[clap(long, env = "AGGREGATOR_LEDGER")]
    pub ledger: PathBuf,

    // --- Telemetry --- //
    /// Whether to emit JSON-formatted logs
    #[clap(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The commands the CLI runs
#[rustfmt::skip]
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Quote the best route for a swap
    Quote {
        /// The token sold; the zero address is the native asset
        #[clap(long)]
        token_in: Address,
        /// The token bought; the zero address is the native asset
        #[clap(long)]
        token_out: Address,
        /// The amount sold, in atoms
        #[clap(long)]
        amount_in: U256,
        /// A pool to restrict the quote to
        #[clap(long)]
        pool_hint: Option<B256>,
    },
    /// Execute a swap described by a JSON request file
    Swap {
        /// The path to the swap request
        #[clap(long)]
        request: PathBuf,
    },
    /// Execute a hex-encoded ABI execution request
    Execute {
        /// The account paying the input
        #[clap(long)]
        payer: Address,
        /// The ABI-encoded execution request, hex with an optional 0x prefix
        #[clap(long)]
        request: String,
        /// The native value accompanying the call, in atoms
        #[clap(long, default_value = "0")]
        msg_value: U256,
        /// The output the quote promised, in atoms
        #[clap(long)]
        expected_output: U256,
        /// The latest block timestamp at which the swap may execute
        #[clap(long)]
        deadline: Option<u64>,
        /// The integrator submitting the swap
        #[clap(long, default_value = "")]
        integrator: String,
    },
}

impl Command {
    /// Run the command against the engine, returning its JSON output
    pub async fn run(self, engine: &SwapEngine) -> anyhow::Result<serde_json::Value> {
        match self {
            Command::Quote { token_in, token_out, amount_in, pool_hint } => {
                let mut request = QuoteRequest::new(token_in, token_out, amount_in);
                if let Some(hint) = pool_hint {
                    request = request.with_pool_hint(hint);
                }

                let response = engine.quote(&request).await;
                quote_output(&response)
            },
            Command::Swap { request } => {
                let contents = std::fs::read_to_string(&request)
                    .with_context(|| format!("reading {}", request.display()))?;
                let request: SwapRequest = serde_json::from_str(&contents)?;

                let receipt = engine.execute_swap(&request).await?;
                receipt_output(&receipt)
            },
            Command::Execute {
                payer,
                request,
                msg_value,
                expected_output,
                deadline,
                integrator,
            } => {
                let bytes = hex::decode(request.trim_start_matches("0x"))
                    .context("execution request is not valid hex")?;
                let request = ExecutionRequest::abi_decode(&bytes)?;
                let metadata = SwapMetadata { integrator, ..Default::default() };

                let receipt = engine
                    .execute_request(
                        payer,
                        &request,
                        msg_value,
                        expected_output,
                        deadline,
                        Some(metadata),
                    )
                    .await?;
                receipt_output(&receipt)
            },
        }
    }
}

/// The JSON output of a quote: the response and its ABI encoding
fn quote_output(response: &QuoteResponse) -> anyhow::Result<serde_json::Value> {
    let encoded = hex::encode(response.abi_encode());
    Ok(json!({
        "response": to_value(response)?,
        "abi": format!("0x{encoded}"),
    }))
}

/// The JSON output of a settled swap
fn receipt_output(receipt: &SwapReceipt) -> anyhow::Result<serde_json::Value> {
    to_value(receipt)
}

/// Serialize a value to JSON
fn to_value<T: Serialize>(value: &T) -> anyhow::Result<serde_json::Value> {
    serde_json::to_value(value).context("serializing output")
}
