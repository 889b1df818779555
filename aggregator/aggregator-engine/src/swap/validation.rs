//! Precondition checks run before a swap touches any balance

use aggregator_api::{is_native_asset, BPS_DENOMINATOR};
use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::SolValue;

use super::types::{SwapKind, SwapRequest};
use crate::{error::SwapError, fees::RefConfiguration, ledger::SettlementLedger};

/// The greatest slippage tolerance a swap may request, in basis points
pub const MAX_SLIPPAGE_BPS: u64 = 5_000;

/// The facts established by validating a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedSwap {
    /// The swap's unique id
    pub swap_id: B256,
    /// The referral configuration
    pub ref_config: RefConfiguration,
    /// The least net output the swap accepts
    pub min_output: U256,
}

/// Check a request's preconditions against the ledger
///
/// `route_trusted` is set when the caller's route, if any, is the one that
/// executes
pub fn validate_request(
    request: &SwapRequest,
    ledger: &SettlementLedger,
    route_trusted: bool,
) -> Result<ValidatedSwap, SwapError> {
    let execution = &request.execution;
    if execution.amount_in.is_zero() {
        return Err(SwapError::InvalidAmount);
    }
    if request.token_in == request.token_out {
        return Err(SwapError::SameTokenSwap);
    }
    if !ledger.is_known_token(&request.token_in) || !ledger.is_known_token(&request.token_out) {
        return Err(SwapError::InvalidTokenAddress);
    }

    if let Some(deadline) = execution.deadline {
        if ledger.block().timestamp > deadline {
            return Err(SwapError::DeadlineElapsed);
        }
    }
    if execution.slippage_bps > MAX_SLIPPAGE_BPS {
        return Err(SwapError::SlippageToleranceTooHigh(execution.slippage_bps));
    }

    let expected_value =
        if is_native_asset(&request.token_in) { execution.amount_in } else { U256::ZERO };
    if request.msg_value != expected_value {
        return Err(SwapError::InvalidMsgValue {
            expected: expected_value,
            actual: request.msg_value,
        });
    }

    if execution.kind != SwapKind::ExactInput {
        return Err(SwapError::UnsupportedSwapKind(execution.kind.to_string()));
    }

    if let Some(route) = &request.route {
        if route.token_in != request.token_in || route.token_out != request.token_out {
            return Err(SwapError::invalid_route_data("route does not trade the requested pair"));
        }
    }

    let ref_config = RefConfiguration::from_ref_data(request.ref_data.as_ref())?;

    let swap_id = swap_id(request, ledger, route_trusted);
    if ledger.has_swap(&swap_id) {
        return Err(SwapError::DuplicateSwap);
    }
    if let Some(nonce) = request.metadata.as_ref().and_then(|m| m.nonce) {
        if ledger.is_nonce_used(request.integrator(), request.payer, nonce) {
            return Err(SwapError::NonceAlreadyUsed);
        }
    }

    let min_output = min_output(execution.expected_output, execution.slippage_bps)?;
    Ok(ValidatedSwap { swap_id, ref_config, min_output })
}

/// The unique id of a swap: the hash of its parameters and the block
///
/// The caller's route generation is part of the id only when that route
/// executes; otherwise the engine picks the route and the caller's is ignored
pub fn swap_id(request: &SwapRequest, ledger: &SettlementLedger, route_trusted: bool) -> B256 {
    let execution = &request.execution;
    let generation_tag = match &request.route {
        Some(route) if route_trusted => u16::from(route.generation.tag()),
        _ => 0,
    };

    keccak256(
        (
            request.payer,
            request.token_in,
            request.token_out,
            execution.amount_in,
            execution.expected_output,
            execution.slippage_bps,
            execution.recipient,
            generation_tag,
            ledger.block().number,
        )
            .abi_encode(),
    )
}

/// The least acceptable output: the expected output less the slippage
/// tolerance, rounded down
pub fn min_output(expected_output: U256, slippage_bps: u64) -> Result<U256, SwapError> {
    let retained = U256::from(BPS_DENOMINATOR.saturating_sub(slippage_bps));
    let scaled = expected_output.checked_mul(retained).ok_or(SwapError::InvalidAmount)?;
    Ok(scaled / U256::from(BPS_DENOMINATOR))
}
