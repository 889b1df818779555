//! Movement of the swap input into the engine and of the output and fees out
//! of it

use aggregator_api::{is_native_asset, NATIVE_ASSET_ADDRESS};
use alloy_primitives::{Address, U256};
use tracing::info;

use super::types::SwapRequest;
use crate::{
    error::SwapError,
    fees::{conversion::NativeFeeSplit, RefConfiguration},
    ledger::SettlementLedger,
};

/// The accounts involved in settling a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementAccounts {
    /// The account the engine trades from
    pub engine: Address,
    /// The account input tokens are pulled through under delegated
    /// allowances, if configured
    pub delegated_spender: Option<Address>,
    /// The platform fee recipient
    pub fee_recipient: Address,
}

/// Pull the swap input from the payer into the engine account
///
/// The native asset arrives as the call value; tokens are pulled against the
/// payer's allowance to the engine, or to the delegated spender when the swap
/// opts into delegated allowances
pub fn collect_input(
    ledger: &mut SettlementLedger,
    request: &SwapRequest,
    accounts: &SettlementAccounts,
) -> Result<(), SwapError> {
    let amount = request.execution.amount_in;
    if is_native_asset(&request.token_in) {
        ledger.transfer(NATIVE_ASSET_ADDRESS, request.payer, accounts.engine, request.msg_value)?;
        return Ok(());
    }

    let delegated = request.metadata.as_ref().is_some_and(|m| m.use_delegated_allowance);
    let spender = if delegated {
        accounts
            .delegated_spender
            .ok_or_else(|| SwapError::config("no delegated allowance account configured"))?
    } else {
        accounts.engine
    };

    ledger.transfer_from(request.token_in, spender, request.payer, accounts.engine, amount)?;
    Ok(())
}

/// Deliver the native fees and the net output
///
/// A native transfer refused by its recipient fails the swap
pub fn pay_out(
    ledger: &mut SettlementLedger,
    request: &SwapRequest,
    accounts: &SettlementAccounts,
    ref_config: &RefConfiguration,
    native_fees: &NativeFeeSplit,
    net_output: U256,
) -> Result<(), SwapError> {
    let engine = accounts.engine;
    ledger.transfer(NATIVE_ASSET_ADDRESS, engine, accounts.fee_recipient, native_fees.platform)?;
    if ref_config.is_active() {
        let referrer = ref_config.ref_address();
        ledger.transfer(NATIVE_ASSET_ADDRESS, engine, referrer, native_fees.referral)?;
    }

    let recipient = request.execution.recipient;
    ledger.transfer(request.token_out, engine, recipient, net_output)?;

    info!(
        %recipient,
        %net_output,
        platform_fee = %native_fees.platform,
        referral_fee = %native_fees.referral,
        "Delivered swap output"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use aggregator_api::metadata::SwapMetadata;

    use super::*;
    use crate::{
        ledger::LedgerError,
        swap::types::{SwapExecution, SwapKind},
        test_helpers::{engine_account, fee_recipient, mock_ledger, payer, usdc, usdc_units},
    };

    /// A request selling USDC for the native asset
    fn usdc_request(amount_in: U256) -> SwapRequest {
        SwapRequest {
            payer: payer(),
            token_in: usdc(),
            token_out: NATIVE_ASSET_ADDRESS,
            route: None,
            execution: SwapExecution {
                amount_in,
                expected_output: U256::ZERO,
                slippage_bps: 100,
                deadline: None,
                recipient: payer(),
                kind: SwapKind::ExactInput,
                trust_provided_quote: false,
            },
            ref_data: None,
            msg_value: U256::ZERO,
            metadata: None,
        }
    }

    /// The settlement accounts used by the tests
    fn accounts(delegated_spender: Option<Address>) -> SettlementAccounts {
        SettlementAccounts {
            engine: engine_account(),
            delegated_spender,
            fee_recipient: fee_recipient(),
        }
    }

    /// Tokens are pulled against the engine's allowance by default, and
    /// against the delegated spender's when requested
    #[test]
    fn test_collect_token_input() {
        let mut ledger = mock_ledger();
        let amount = usdc_units(100);
        collect_input(&mut ledger, &usdc_request(amount), &accounts(None)).unwrap();
        assert_eq!(ledger.balance_of(usdc(), engine_account()), amount);

        let delegate = Address::repeat_byte(0xde);
        let mut request = usdc_request(amount);
        request.metadata =
            Some(SwapMetadata { use_delegated_allowance: true, ..Default::default() });

        let res = collect_input(&mut ledger, &request, &accounts(None));
        assert!(matches!(res, Err(SwapError::Config(_))));

        let res = collect_input(&mut ledger, &request, &accounts(Some(delegate)));
        assert!(matches!(res, Err(SwapError::Ledger(LedgerError::InsufficientAllowance { .. }))));

        ledger.approve(usdc(), payer(), delegate, amount);
        collect_input(&mut ledger, &request, &accounts(Some(delegate))).unwrap();
        assert_eq!(ledger.balance_of(usdc(), engine_account()), amount * U256::from(2u64));
    }

    /// A fee recipient refusing the native asset fails the payout
    #[test]
    fn test_rejected_native_fee() {
        let mut ledger = mock_ledger();
        ledger.mint(NATIVE_ASSET_ADDRESS, engine_account(), U256::from(1_000u64)).unwrap();
        ledger.mark_non_receiving(fee_recipient());

        let fees = NativeFeeSplit { platform: U256::from(10u64), referral: U256::ZERO };
        let res = pay_out(
            &mut ledger,
            &usdc_request(U256::from(1u64)),
            &accounts(None),
            &RefConfiguration::none(),
            &fees,
            U256::from(990u64),
        );
        assert_eq!(res, Err(SwapError::NativeAssetTransferFailed));
    }
}
