//! Types describing a swap request, its progress and its outcome

use std::fmt::Display;

use aggregator_api::{
    execution::{ExecutionRequest, RefData},
    metadata::SwapMetadata,
    route::SwapRoute,
    serialization::u256_string_serialization,
};
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    error::SwapError,
    fees::{conversion::NativeFeeSplit, FeeProcessing},
};

// ------------
// | Requests |
// ------------

/// Whether the input or the output amount of a swap is fixed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapKind {
    /// The input amount is fixed
    #[default]
    ExactInput,
    /// The output amount is fixed
    ExactOutput,
}

impl Display for SwapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapKind::ExactInput => write!(f, "exact_input"),
            SwapKind::ExactOutput => write!(f, "exact_output"),
        }
    }
}

/// The execution parameters of a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapExecution {
    /// The amount sold
    #[serde(with = "u256_string_serialization")]
    pub amount_in: U256,
    /// The output the caller's quote promised
    #[serde(with = "u256_string_serialization")]
    pub expected_output: U256,
    /// The tolerated shortfall from the expected output, in basis points
    pub slippage_bps: u64,
    /// The latest block timestamp at which the swap may execute
    #[serde(default)]
    pub deadline: Option<u64>,
    /// The account receiving the output
    pub recipient: Address,
    /// The swap kind; only exact input is executable
    #[serde(default)]
    pub kind: SwapKind,
    /// Whether the caller's route is executed without revalidating it
    /// against a fresh quote
    #[serde(default)]
    pub trust_provided_quote: bool,
}

/// A request to execute a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    /// The account paying the input
    pub payer: Address,
    /// The token sold
    pub token_in: Address,
    /// The token bought
    pub token_out: Address,
    /// The caller's route, honored in trust mode
    #[serde(default)]
    pub route: Option<SwapRoute>,
    /// The execution parameters
    pub execution: SwapExecution,
    /// The referral data
    #[serde(default)]
    pub ref_data: Option<RefData>,
    /// The native value accompanying the call
    #[serde(default, with = "u256_string_serialization")]
    pub msg_value: U256,
    /// Informational metadata
    #[serde(default)]
    pub metadata: Option<SwapMetadata>,
}

impl SwapRequest {
    /// Build a swap request from a wire execution request
    ///
    /// A request carrying the no-route tag is rejected here, before anything
    /// executes
    pub fn from_execution_request(
        payer: Address,
        request: &ExecutionRequest,
        msg_value: U256,
        expected_output: U256,
        deadline: Option<u64>,
        metadata: Option<SwapMetadata>,
    ) -> Result<Self, SwapError> {
        let route = request.route()?.ok_or(SwapError::NoRouteFound)?;

        Ok(Self {
            payer,
            token_in: request.token_in,
            token_out: request.token_out,
            route: Some(route),
            execution: SwapExecution {
                amount_in: request.amount_in,
                expected_output,
                slippage_bps: request.slippage_bps,
                deadline,
                recipient: request.recipient,
                kind: SwapKind::ExactInput,
                trust_provided_quote: false,
            },
            ref_data: request.ref_data,
            msg_value,
            metadata,
        })
    }

    /// The integrator named in the metadata, empty if none
    pub fn integrator(&self) -> &str {
        self.metadata.as_ref().map(|m| m.integrator.as_str()).unwrap_or_default()
    }
}

// ---------
// | State |
// ---------

/// The states a swap moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapState {
    /// Not yet started
    Idle,
    /// Checking the request's preconditions
    Validating,
    /// A route has been chosen
    Routed,
    /// The fee plan has been resolved
    FeeComputed,
    /// The route is executing
    Executing,
    /// The output and fees have been delivered
    Settled,
    /// The swap failed and every effect was rolled back
    Reverted,
}

impl SwapState {
    /// Whether the state machine may move from `self` to `next`
    pub fn can_transition_to(self, next: SwapState) -> bool {
        use SwapState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Routed)
                | (Routed, FeeComputed)
                | (FeeComputed, Executing)
                | (Executing, Settled)
        ) || (next == Reverted && !matches!(self, Settled | Reverted))
    }
}

impl Display for SwapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SwapState::Idle => "idle",
            SwapState::Validating => "validating",
            SwapState::Routed => "routed",
            SwapState::FeeComputed => "fee_computed",
            SwapState::Executing => "executing",
            SwapState::Settled => "settled",
            SwapState::Reverted => "reverted",
        };
        write!(f, "{name}")
    }
}

/// The states a swap has visited, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTrace {
    /// The visited states
    states: Vec<SwapState>,
}

impl Default for StateTrace {
    fn default() -> Self {
        Self { states: vec![SwapState::Idle] }
    }
}

impl StateTrace {
    /// The current state
    pub fn current(&self) -> SwapState {
        self.states.last().copied().unwrap_or(SwapState::Idle)
    }

    /// Move to the next state
    pub fn advance(&mut self, next: SwapState) -> Result<(), SwapError> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(SwapError::config(format!("invalid transition {current} -> {next}")));
        }

        self.states.push(next);
        Ok(())
    }

    /// The visited states
    pub fn states(&self) -> &[SwapState] {
        &self.states
    }
}

/// Per-swap bookkeeping, discarded when the swap ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapCache {
    /// The swap's unique id
    pub swap_id: B256,
    /// The ledger's cumulative gas when the swap started executing
    pub gas_start: u64,
    /// The engine's output token balance before execution
    pub pre_balance: U256,
    /// The engine's output token balance after execution
    pub post_balance: U256,
    /// The block timestamp the swap executed at
    pub timestamp: u64,
}

impl SwapCache {
    /// The output the route actually delivered
    pub fn realized_output(&self) -> Result<U256, SwapError> {
        self.post_balance
            .checked_sub(self.pre_balance)
            .ok_or_else(|| SwapError::invalid_route_data("route reduced the output balance"))
    }
}

// -------------
// | Receipts |
// -------------

/// The outcome of a settled swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapReceipt {
    /// The swap's unique id
    pub swap_id: B256,
    /// The route executed
    pub route: SwapRoute,
    /// The amount sold
    #[serde(with = "u256_string_serialization")]
    pub amount_in: U256,
    /// The output the route delivered, before fees
    #[serde(with = "u256_string_serialization")]
    pub realized_output: U256,
    /// The fees taken from the output
    pub fees: FeeProcessing,
    /// The native amounts delivered to the fee recipients
    pub native_fees: NativeFeeSplit,
    /// The output delivered to the recipient
    #[serde(with = "u256_string_serialization")]
    pub net_output: U256,
    /// The least net output the swap would accept
    #[serde(with = "u256_string_serialization")]
    pub min_output: U256,
    /// The account that received the output
    pub recipient: Address,
    /// The states visited
    pub trace: StateTrace,
    /// The gas estimate of the swap, fee conversion included
    pub gas_used: u64,
    /// The block timestamp of execution
    pub timestamp: u64,
    /// The caller's opaque user data, echoed back
    pub user_data: Bytes,
}
