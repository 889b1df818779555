//! The fee-tiered adapter: one pool per pair and fee tier, the best tier wins

use aggregator_api::{
    generation::AmmGeneration,
    payload::{decode_fee_tiered_route, encode_fee_tiered_route},
    quote::QuoteRequest,
    route::SwapRoute,
};
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use tracing::debug;

use super::{
    price_pool, resolve_hinted_pool, swap_into_pool, AdapterError, RouteQuote, VersionAdapter,
};
use crate::ledger::{pools::PoolRecord, SettlementLedger};

/// The gas estimate of a fee-tiered swap
const FEE_TIERED_SWAP_GAS: u64 = 130_000;

/// The fee tiers searched by default, in hundredths of a basis point
pub const DEFAULT_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10_000];

/// The adapter for fee-tiered pools
#[derive(Debug, Clone)]
pub struct FeeTieredAdapter {
    /// The fee tiers searched when quoting
    fee_tiers: Vec<u32>,
}

impl Default for FeeTieredAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_TIERS.to_vec())
    }
}

impl FeeTieredAdapter {
    /// Constructor
    pub fn new(mut fee_tiers: Vec<u32>) -> Self {
        fee_tiers.sort_unstable();
        fee_tiers.dedup();
        Self { fee_tiers }
    }

    /// Build the quote for a single pool
    fn quote_pool(
        ledger: &SettlementLedger,
        pool: &PoolRecord,
        request: &QuoteRequest,
    ) -> Result<RouteQuote, AdapterError> {
        let (amount_out, liquidity) =
            price_pool(ledger, pool, request.token_in, request.amount_in)?;

        Ok(RouteQuote {
            route: SwapRoute {
                token_in: request.token_in,
                token_out: request.token_out,
                generation: AmmGeneration::FeeTiered,
                fee_tier: pool.fee_pips,
                path: Vec::new(),
                route_data: encode_fee_tiered_route(pool.account, pool.fee_pips),
                hook_data: Bytes::new(),
            },
            amount_out,
            liquidity,
            gas_estimate: FEE_TIERED_SWAP_GAS,
            pools: vec![pool.id],
        })
    }

    /// Resolve the pool a route executes against
    ///
    /// Routes rebuilt from an execution request carry only the fee tier, so
    /// the pool is looked up by pair and tier; routes carrying route data
    /// name the pool directly.
    fn resolve_pool(
        ledger: &SettlementLedger,
        route: &SwapRoute,
    ) -> Result<PoolRecord, AdapterError> {
        let (pool_account, fee) = if route.route_data.is_empty() {
            (None, route.fee_tier)
        } else {
            let (account, fee) = decode_fee_tiered_route(&route.route_data)?;
            (Some(account), fee)
        };

        if fee != route.fee_tier {
            return Err(AdapterError::route_data("fee tier does not match the route data"));
        }

        ledger
            .pools()
            .find(AmmGeneration::FeeTiered, route.token_in, route.token_out)
            .find(|pool| pool.fee_pips == fee && pool_account.map_or(true, |a| a == pool.account))
            .cloned()
            .ok_or(AdapterError::NoPool)
    }
}

#[async_trait]
impl VersionAdapter for FeeTieredAdapter {
    fn generation(&self) -> AmmGeneration {
        AmmGeneration::FeeTiered
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

        // Pools are visited in ascending fee order, so the cheaper tier wins
        // an exact tie
        let mut best: Option<RouteQuote> = None;
        let mut dust_seen = false;
        for fee in self.fee_tiers.iter().copied() {
            let pools = ledger
                .pools()
                .find(self.generation(), request.token_in, request.token_out)
                .filter(|pool| pool.fee_pips == fee);

            for pool in pools {
                match Self::quote_pool(ledger, pool, request) {
                    Ok(quote) => {
                        if best.as_ref().map_or(true, |b| quote.amount_out > b.amount_out) {
                            best = Some(quote);
                        }
                    },
                    Err(e) => {
                        dust_seen |= e == AdapterError::DustAmount;
                        debug!(fee_tier = fee, "Skipping fee tiered pool: {e}");
                    },
                }
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
        let pool = Self::resolve_pool(ledger, route)?;
        let amount_out = swap_into_pool(ledger, &pool, route.token_in, amount_in, trader)?;
        ledger.transfer(route.token_out, pool.account, trader, amount_out)?;
        ledger.charge_gas(FEE_TIERED_SWAP_GAS);

        Ok(amount_out)
    }
}
