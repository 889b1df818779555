//! Conversion of fees taken in a non-native token into the native asset
//!
//! Fee recipients are only ever paid in the native asset. When a swap's
//! output is some other token, the fees are sold for the native asset through
//! the same aggregator and adapters that routed the swap itself, then split
//! between the platform and referrer in proportion to their rates. Each
//! conversion runs against a copy of the ledger, committed only on success.

use aggregator_api::{is_native_asset, quote::QuoteRequest, NATIVE_ASSET_ADDRESS};
use alloy_primitives::{Address, U256};
use futures::{future::BoxFuture, FutureExt};
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::FeeProcessing;
use crate::{
    error::SwapError,
    ledger::SettlementLedger,
    quotes::{QuoteAggregator, SelectionPolicy},
    venues::RouteQuote,
};

/// The native-asset amounts owed to each fee recipient
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NativeFeeSplit {
    /// The native amount owed to the platform
    #[serde(with = "aggregator_api::serialization::u256_string_serialization")]
    pub platform: U256,
    /// The native amount owed to the referrer
    #[serde(with = "aggregator_api::serialization::u256_string_serialization")]
    pub referral: U256,
}

impl NativeFeeSplit {
    /// The total native amount owed
    pub fn total(&self) -> U256 {
        self.platform + self.referral
    }
}

/// How a swap's fees were settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSettlement {
    /// The fees were sold for the native asset, owed as split
    Native(NativeFeeSplit),
    /// The fees were worth less than one atom of the native asset and stay
    /// in the swap output
    Waived,
}

/// Convert a swap's fees into the native asset, held by `holder`
///
/// `depth` bounds the number of conversion swaps. A fee token without a
/// direct route to native is stepped through neighbouring tokens, one swap
/// per step. A fee too small to price in any pool is waived.
#[instrument(skip_all, fields(fee_token = %fee_token, total_fee = %fees.total_fee()))]
pub async fn convert_fees_to_native(
    aggregator: &QuoteAggregator,
    ledger: &mut SettlementLedger,
    fees: &FeeProcessing,
    fee_token: Address,
    holder: Address,
    policy: SelectionPolicy,
    depth: u8,
) -> Result<FeeSettlement, SwapError> {
    let total = fees.total_fee();
    if total.is_zero() {
        return Ok(FeeSettlement::Native(NativeFeeSplit::default()));
    }
    if is_native_asset(&fee_token) {
        let split = NativeFeeSplit { platform: fees.platform_fee, referral: fees.ref_fee };
        return Ok(FeeSettlement::Native(split));
    }

    let mut trial = ledger.clone();
    let sold =
        sell_for_native(aggregator, &mut trial, fee_token, total, holder, policy, depth).await;
    let err = match sold {
        Ok(native_total) => {
            *ledger = trial;
            let split = split_pro_rata(native_total, fees)?;
            info!(
                native_total = %native_total,
                platform = %split.platform,
                referral = %split.referral,
                "Converted fees to native"
            );
            return Ok(FeeSettlement::Native(split));
        },
        Err(e) => e,
    };

    if is_dust_fee(aggregator, ledger, fee_token, total).await {
        info!("Fee too small to convert to native, waived");
        return Ok(FeeSettlement::Waived);
    }
    Err(err)
}

/// Sell `amount` of `token` held by `holder` for the native asset in at most
/// `depth` swaps, returning the native amount received
///
/// A direct route to native is taken when the aggregator has one. Otherwise
/// each token sharing a pool with `token` is tried in address order, and the
/// first from which native is reachable within the remaining depth is used.
fn sell_for_native<'a>(
    aggregator: &'a QuoteAggregator,
    ledger: &'a mut SettlementLedger,
    token: Address,
    amount: U256,
    holder: Address,
    policy: SelectionPolicy,
    depth: u8,
) -> BoxFuture<'a, Result<U256, SwapError>> {
    async move {
        if is_native_asset(&token) {
            return Ok(amount);
        }
        if depth == 0 {
            return Err(SwapError::fee_conversion("fee conversion depth exhausted"));
        }

        let direct = QuoteRequest::new(token, NATIVE_ASSET_ADDRESS, amount);
        if let Some(quote) = aggregator.quote(ledger, &direct, policy).await {
            return execute_leg(aggregator, ledger, &quote, amount, holder).await;
        }

        let neighbours = ledger.pools().neighbours(token);
        for next in neighbours.into_iter().filter(|t| !is_native_asset(t)) {
            let request = QuoteRequest::new(token, next, amount);
            let Some(quote) = aggregator.quote(ledger, &request, policy).await else {
                continue;
            };

            let mut trial = ledger.clone();
            let res = match execute_leg(aggregator, &mut trial, &quote, amount, holder).await {
                Ok(received) => {
                    sell_for_native(aggregator, &mut trial, next, received, holder, policy, depth - 1)
                        .await
                },
                Err(e) => Err(e),
            };
            match res {
                Ok(native_total) => {
                    *ledger = trial;
                    return Ok(native_total);
                },
                Err(e) => debug!(via = %next, "Fee conversion step failed: {e}"),
            }
        }

        Err(SwapError::fee_conversion(format!("no route from {token} to native")))
    }
    .boxed()
}

/// Execute one conversion swap, returning the amount `holder` received
async fn execute_leg(
    aggregator: &QuoteAggregator,
    ledger: &mut SettlementLedger,
    quote: &RouteQuote,
    amount: U256,
    holder: Address,
) -> Result<U256, SwapError> {
    let adapter = aggregator
        .registry()
        .get_adapter(quote.generation())
        .ok_or_else(|| SwapError::fee_conversion("quoting adapter is not registered"))?;

    let token_out = quote.route.token_out;
    let pre_balance = ledger.balance_of(token_out, holder);
    adapter.execute(ledger, &quote.route, amount, holder).await.map_err(SwapError::fee_conversion)?;
    let post_balance = ledger.balance_of(token_out, holder);

    post_balance
        .checked_sub(pre_balance)
        .ok_or_else(|| SwapError::fee_conversion("fee conversion reduced the holder's balance"))
}

/// Whether a fee is too small to sell: its direct sale to native, or its
/// first step towards native, prices to zero
async fn is_dust_fee(
    aggregator: &QuoteAggregator,
    ledger: &SettlementLedger,
    token: Address,
    amount: U256,
) -> bool {
    let direct = QuoteRequest::new(token, NATIVE_ASSET_ADDRESS, amount);
    if aggregator.is_dust(ledger, &direct).await {
        return true;
    }

    for next in ledger.pools().neighbours(token) {
        if aggregator.is_dust(ledger, &QuoteRequest::new(token, next, amount)).await {
            return true;
        }
    }
    false
}

/// Split a native amount between platform and referrer in proportion to the
/// fees each earned
///
/// The referrer's share rounds down; the platform receives the remainder
pub fn split_pro_rata(
    native_total: U256,
    fees: &FeeProcessing,
) -> Result<NativeFeeSplit, SwapError> {
    let total_fee = fees.total_fee();
    if total_fee.is_zero() {
        return Ok(NativeFeeSplit::default());
    }

    let referral = native_total
        .checked_mul(fees.ref_fee)
        .ok_or_else(|| SwapError::fee_conversion("fee split overflows"))?
        / total_fee;
    let platform = native_total - referral;

    Ok(NativeFeeSplit { platform, referral })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fees::{compute_fees, RefConfiguration},
        test_helpers::{
            dai, default_registry, engine_account, mock_ledger, unroutable_token, usdc, wad,
        },
    };

    /// Fees processed on a USDC output
    fn usdc_fees(raw: u64) -> FeeProcessing {
        let ref_config = RefConfiguration::new(Address::repeat_byte(0x0f), 50).unwrap();
        compute_fees(U256::from(raw), &ref_config, 10).unwrap()
    }

    /// The referrer's share rounds down and the platform takes the rest
    #[test]
    fn test_split_pro_rata() {
        let fees = usdc_fees(1_000_000);
        // Fees of 1000 platform and 5000 referral: the referrer earns 5/6
        let split = split_pro_rata(U256::from(100u64), &fees).unwrap();
        assert_eq!(split.referral, U256::from(83u64));
        assert_eq!(split.platform, U256::from(17u64));
    }

    /// Native fees pass through unconverted
    #[tokio::test]
    async fn test_native_fees_unconverted() {
        let mut ledger = mock_ledger();
        let aggregator = QuoteAggregator::new(default_registry());
        let fees = usdc_fees(1_000_000);

        let split = convert_fees_to_native(
            &aggregator,
            &mut ledger,
            &fees,
            NATIVE_ASSET_ADDRESS,
            engine_account(),
            SelectionPolicy::default(),
            1,
        )
        .await
        .unwrap();
        let expected = NativeFeeSplit { platform: fees.platform_fee, referral: fees.ref_fee };
        assert_eq!(split, FeeSettlement::Native(expected));
    }

    /// Token fees are sold for native and split
    #[tokio::test]
    async fn test_token_fees_converted() {
        let mut ledger = mock_ledger();
        let aggregator = QuoteAggregator::new(default_registry());
        let fees = usdc_fees(1_000_000_000);
        ledger.mint(usdc(), engine_account(), fees.total_fee()).unwrap();

        let settlement = convert_fees_to_native(
            &aggregator,
            &mut ledger,
            &fees,
            usdc(),
            engine_account(),
            SelectionPolicy::default(),
            1,
        )
        .await
        .unwrap();
        let FeeSettlement::Native(split) = settlement else { panic!("fees were waived") };

        assert!(split.referral > split.platform);
        assert_eq!(ledger.balance_of(NATIVE_ASSET_ADDRESS, engine_account()), split.total());
        assert_eq!(ledger.balance_of(usdc(), engine_account()), U256::ZERO);
    }

    /// A fee token with no route to native cannot be converted, nor can any
    /// token once the depth is exhausted
    #[tokio::test]
    async fn test_conversion_failures() {
        let mut ledger = mock_ledger();
        let aggregator = QuoteAggregator::new(default_registry());
        let fees = usdc_fees(1_000_000);
        let policy = SelectionPolicy::default();
        let holder = engine_account();

        let res = convert_fees_to_native(
            &aggregator,
            &mut ledger,
            &fees,
            unroutable_token(),
            holder,
            policy,
            1,
        )
        .await;
        assert!(matches!(res, Err(SwapError::FeeConversionFailed(_))));

        let res =
            convert_fees_to_native(&aggregator, &mut ledger, &fees, usdc(), holder, policy, 0)
                .await;
        assert!(matches!(res, Err(SwapError::FeeConversionFailed(_))));
    }

    /// A fee token without a direct route steps through a neighbouring
    /// token, one conversion swap per unit of depth
    #[tokio::test]
    async fn test_conversion_steps_through_neighbour() {
        let aggregator = QuoteAggregator::new(default_registry());
        let fees = compute_fees(wad(1_000), &RefConfiguration::none(), 10).unwrap();
        let policy = SelectionPolicy::default();
        let holder = engine_account();

        // DAI reaches native only through USDC, which takes two swaps
        let mut ledger = mock_ledger();
        ledger.mint(dai(), holder, fees.total_fee()).unwrap();
        let res =
            convert_fees_to_native(&aggregator, &mut ledger, &fees, dai(), holder, policy, 1)
                .await;
        assert!(matches!(res, Err(SwapError::FeeConversionFailed(_))));
        assert_eq!(ledger.balance_of(dai(), holder), fees.total_fee());
        assert_eq!(ledger.balance_of(usdc(), holder), U256::ZERO);

        let settlement =
            convert_fees_to_native(&aggregator, &mut ledger, &fees, dai(), holder, policy, 2)
                .await
                .unwrap();
        let FeeSettlement::Native(split) = settlement else { panic!("fees were waived") };
        assert!(split.platform > U256::ZERO);
        assert_eq!(ledger.balance_of(NATIVE_ASSET_ADDRESS, holder), split.total());
        assert_eq!(ledger.balance_of(dai(), holder), U256::ZERO);
        assert_eq!(ledger.balance_of(usdc(), holder), U256::ZERO);
    }

    /// A fee worth less than one atom of the next token is waived, not failed
    #[tokio::test]
    async fn test_dust_fee_waived() {
        let aggregator = QuoteAggregator::new(default_registry());
        let fees =
            compute_fees(U256::from(996_999_999_999u64), &RefConfiguration::none(), 10).unwrap();
        let holder = engine_account();

        let mut ledger = mock_ledger();
        ledger.mint(dai(), holder, fees.total_fee()).unwrap();
        let settlement = convert_fees_to_native(
            &aggregator,
            &mut ledger,
            &fees,
            dai(),
            holder,
            SelectionPolicy::default(),
            4,
        )
        .await
        .unwrap();

        assert_eq!(settlement, FeeSettlement::Waived);
        assert_eq!(ledger.balance_of(dai(), holder), fees.total_fee());
    }
}
