//! The hook-enabled adapter: pools identified by a pool key, optionally
//! carrying a hook that takes a cut of the output

use aggregator_api::{
    generation::AmmGeneration, payload::HookPoolKey, quote::QuoteRequest, route::SwapRoute,
};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use tracing::debug;

use super::{
    amm_math::take_bps, price_pool, resolve_hinted_pool, swap_into_pool, AdapterError,
    RouteQuote, VersionAdapter,
};
use crate::ledger::{pools::PoolRecord, SettlementLedger};

/// The gas estimate of a hook-enabled swap through a pool without a hook
const HOOK_ENABLED_SWAP_GAS: u64 = 110_000;
/// The additional gas of invoking a hook
const HOOK_CALL_GAS: u64 = 40_000;

/// The adapter for hook-enabled pools
#[derive(Debug, Clone, Copy, Default)]
pub struct HookEnabledAdapter;

impl HookEnabledAdapter {
    /// The gas estimate of a swap through the given pool
    fn gas_estimate(pool: &PoolRecord) -> u64 {
        match pool.hook {
            Some(_) => HOOK_ENABLED_SWAP_GAS + HOOK_CALL_GAS,
            None => HOOK_ENABLED_SWAP_GAS,
        }
    }

    /// The hook's fee rate for a pool, zero without a hook
    fn hook_fee_bps(pool: &PoolRecord) -> u64 {
        pool.hook.map(|h| h.fee_bps).unwrap_or_default()
    }

    /// Build the quote for a single pool, net of the hook's cut
    fn quote_pool(
        ledger: &SettlementLedger,
        pool: &PoolRecord,
        request: &QuoteRequest,
    ) -> Result<RouteQuote, AdapterError> {
        let (gross_out, liquidity) =
            price_pool(ledger, pool, request.token_in, request.amount_in)?;
        let (amount_out, _) = take_bps(gross_out, Self::hook_fee_bps(pool))?;

        let key = pool.hook_key();
        Ok(RouteQuote {
            route: SwapRoute {
                token_in: request.token_in,
                token_out: request.token_out,
                generation: AmmGeneration::HookEnabled,
                fee_tier: aggregator_api::route::NO_FEE_TIER,
                path: Vec::new(),
                route_data: key.to_route_data(),
                hook_data: key.hook_data(),
            },
            amount_out,
            liquidity,
            gas_estimate: Self::gas_estimate(pool),
            pools: vec![pool.id],
        })
    }
}

#[async_trait]
impl VersionAdapter for HookEnabledAdapter {
    fn generation(&self) -> AmmGeneration {
        AmmGeneration::HookEnabled
    }

    async fn get_quote(
        &self,
        ledger: &SettlementLedger,
        request: &QuoteRequest,
    ) -> Result<RouteQuote, AdapterError> {
        if let Some(hint) = request.pool_hint {
            let pool = resolve_hinted_pool(ledger, self.generation(), request, &hint)?;
            return Self::quote_pool(ledger, pool, request);
        }

        let mut best: Option<RouteQuote> = None;
        let mut dust_seen = false;
        for pool in ledger.pools().find(self.generation(), request.token_in, request.token_out) {
            match Self::quote_pool(ledger, pool, request) {
                Ok(quote) => {
                    if best.as_ref().map_or(true, |b| quote.amount_out > b.amount_out) {
                        best = Some(quote);
                    }
                },
                Err(e) => {
                    dust_seen |= e == AdapterError::DustAmount;
                    debug!(pool = %pool.id, "Skipping hook pool: {e}");
                },
            }
        }

        best.ok_or(AdapterError::unquoted(dust_seen))
    }

    async fn execute(
        &self,
        ledger: &mut SettlementLedger,
        route: &SwapRoute,
        amount_in: U256,
        trader: Address,
    ) -> Result<U256, AdapterError> {
        let key = HookPoolKey::from_route_data(&route.route_data)?;
        let pool = ledger.pool(&key.pool_id())?.clone();
        if !pool.trades_pair(route.token_in, route.token_out) {
            return Err(AdapterError::route_data("pool key does not match the route's tokens"));
        }

        let gross_out = swap_into_pool(ledger, &pool, route.token_in, amount_in, trader)?;
        let (amount_out, hook_fee) = take_bps(gross_out, Self::hook_fee_bps(&pool))?;
        if let Some(hook) = pool.hook {
            ledger.transfer(route.token_out, pool.account, hook.address, hook_fee)?;
        }

        ledger.transfer(route.token_out, pool.account, trader, amount_out)?;
        ledger.charge_gas(Self::gas_estimate(&pool));
        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use aggregator_api::NATIVE_ASSET_ADDRESS;

    use super::*;
    use crate::test_helpers::{engine_account, hook_address, mock_ledger, usdc, wad};

    /// The hook's cut is reflected in the quote and paid on execution
    #[tokio::test]
    async fn test_hook_fee_paid() {
        let mut ledger = mock_ledger();
        let trader = engine_account();
        let amount_in = wad(1) / U256::from(10u64);
        ledger.mint(NATIVE_ASSET_ADDRESS, trader, amount_in).unwrap();

        let request = QuoteRequest::new(NATIVE_ASSET_ADDRESS, usdc(), amount_in);
        let quote = HookEnabledAdapter.get_quote(&ledger, &request).await.unwrap();
        assert_eq!(quote.gas_estimate, HOOK_ENABLED_SWAP_GAS + HOOK_CALL_GAS);
        assert_eq!(quote.to_response().hook, hook_address());

        let out = HookEnabledAdapter.execute(&mut ledger, &quote.route, amount_in, trader).await;
        let out = out.unwrap();
        assert_eq!(out, quote.amount_out);
        assert!(ledger.balance_of(usdc(), hook_address()) > U256::ZERO);
    }

    /// Route data naming an unregistered pool cannot execute
    #[tokio::test]
    async fn test_unknown_pool_key() {
        let mut ledger = mock_ledger();
        let key = HookPoolKey::new(NATIVE_ASSET_ADDRESS, usdc(), 42, Address::ZERO);
        let route = SwapRoute {
            token_in: NATIVE_ASSET_ADDRESS,
            token_out: usdc(),
            generation: AmmGeneration::HookEnabled,
            fee_tier: 0,
            path: Vec::new(),
            route_data: key.to_route_data(),
            hook_data: key.hook_data(),
        };

        let res = HookEnabledAdapter.execute(&mut ledger, &route, wad(1), engine_account()).await;
        assert!(matches!(res, Err(AdapterError::Ledger(_))));
    }
}
