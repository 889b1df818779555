//! The direct pair adapter: constant-product pairs with a fixed fee, routed
//! directly or through one configured intermediate token

use aggregator_api::{
    generation::AmmGeneration,
    payload::encode_direct_pair_route,
    quote::QuoteRequest,
    route::{SwapRoute, NO_FEE_TIER},
};
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use itertools::Itertools;
use tracing::debug;

use super::{
    price_pool, resolve_hinted_pool, swap_into_pool, AdapterError, RouteQuote, VersionAdapter,
};
use crate::ledger::{pools::PoolRecord, SettlementLedger};

/// The gas estimate of a single-hop direct pair swap
const SINGLE_HOP_GAS: u64 = 90_000;
/// The additional gas of each hop past the first
const ADDITIONAL_HOP_GAS: u64 = 60_000;

/// A path priced through a sequence of pools
struct PricedPath {
    /// The full token path, endpoints included
    tokens: Vec<Address>,
    /// The pools traversed, one per hop
    pools: Vec<B256>,
    /// The output of the final hop
    amount_out: U256,
    /// The output-side reserve of the final pool
    liquidity: U256,
}

/// The adapter for direct pair pools
#[derive(Debug, Clone, Default)]
pub struct DirectPairAdapter {
    /// The tokens a route may pass through between its endpoints
    intermediate_tokens: Vec<Address>,
}

impl DirectPairAdapter {
    /// Constructor
    pub fn new(intermediate_tokens: Vec<Address>) -> Self {
        Self { intermediate_tokens }
    }

    /// The candidate token paths for a pair: the direct hop, then one path
    /// through each intermediate
    fn candidate_paths(&self, token_in: Address, token_out: Address) -> Vec<Vec<Address>> {
        let via = self
            .intermediate_tokens
            .iter()
            .copied()
            .filter(|mid| *mid != token_in && *mid != token_out)
            .unique()
            .map(|mid| vec![token_in, mid, token_out]);

        std::iter::once(vec![token_in, token_out]).chain(via).collect()
    }

    /// Price a token path, hop by hop
    fn price_path(
        ledger: &SettlementLedger,
        tokens: Vec<Address>,
        amount_in: U256,
    ) -> Result<PricedPath, AdapterError> {
        let mut amount = amount_in;
        let mut liquidity = U256::ZERO;
        let mut pools = Vec::with_capacity(tokens.len() - 1);

        for (hop_in, hop_out) in tokens.iter().copied().tuple_windows() {
            let pool = find_pair(ledger, hop_in, hop_out)?;
            let (out, reserve_out) = price_pool(ledger, pool, hop_in, amount)?;
            amount = out;
            liquidity = reserve_out;
            pools.push(pool.id);
        }

        Ok(PricedPath { tokens, pools, amount_out: amount, liquidity })
    }

    /// Build the quote for a priced path
    fn build_quote(token_in: Address, token_out: Address, priced: PricedPath) -> RouteQuote {
        let hops = priced.pools.len() as u64;
        let intermediates = priced.tokens[1..priced.tokens.len() - 1].to_vec();

        RouteQuote {
            route: SwapRoute {
                token_in,
                token_out,
                generation: AmmGeneration::DirectPair,
                fee_tier: NO_FEE_TIER,
                path: intermediates,
                route_data: encode_direct_pair_route(&priced.tokens),
                hook_data: Bytes::new(),
            },
            amount_out: priced.amount_out,
            liquidity: priced.liquidity,
            gas_estimate: SINGLE_HOP_GAS + ADDITIONAL_HOP_GAS * hops.saturating_sub(1),
            pools: priced.pools,
        }
    }
}

#[async_trait]
impl VersionAdapter for DirectPairAdapter {
    fn generation(&self) -> AmmGeneration {
        AmmGeneration::DirectPair
    }

    async fn get_quote(
        &self,
        ledger: &SettlementLedger,
        request: &QuoteRequest,
    ) -> Result<RouteQuote, AdapterError> {
        let QuoteRequest { token_in, token_out, amount_in, .. } = *request;

        if let Some(hint) = request.pool_hint {
            resolve_hinted_pool(ledger, self.generation(), request, &hint)?;
            let priced = Self::price_path(ledger, vec![token_in, token_out], amount_in)?;
            return Ok(Self::build_quote(token_in, token_out, priced));
        }

        // Shorter paths win ties, as they are listed first
        let mut best: Option<PricedPath> = None;
        let mut dust_seen = false;
        for path in self.candidate_paths(token_in, token_out) {
            match Self::price_path(ledger, path, amount_in) {
                Ok(priced) => {
                    if best.as_ref().map_or(true, |b| priced.amount_out > b.amount_out) {
                        best = Some(priced);
                    }
                },
                Err(e) => {
                    dust_seen |= e == AdapterError::DustAmount;
                    debug!("Skipping direct pair path: {e}");
                },
            }
        }

        let best = best.ok_or(AdapterError::unquoted(dust_seen))?;
        Ok(Self::build_quote(token_in, token_out, best))
    }

    async fn execute(
        &self,
        ledger: &mut SettlementLedger,
        route: &SwapRoute,
        amount_in: U256,
        trader: Address,
    ) -> Result<U256, AdapterError> {
        let tokens = route.full_path()?;
        let endpoints_match =
            tokens.first() == Some(&route.token_in) && tokens.last() == Some(&route.token_out);
        if tokens.len() < 2 || !endpoints_match {
            return Err(AdapterError::route_data("path does not connect the route's tokens"));
        }

        // Each pool forwards its output straight into the next pool
        let mut holder = trader;
        let mut amount = amount_in;
        let mut hops = 0u64;
        for (hop_in, hop_out) in tokens.iter().copied().tuple_windows() {
            let pool = find_pair(ledger, hop_in, hop_out)?.clone();
            amount = swap_into_pool(ledger, &pool, hop_in, amount, holder)?;
            holder = pool.account;
            hops += 1;
        }

        ledger.transfer(route.token_out, holder, trader, amount)?;
        ledger.charge_gas(SINGLE_HOP_GAS + ADDITIONAL_HOP_GAS * hops.saturating_sub(1));
        Ok(amount)
    }
}

/// Find the direct pair pool for a token pair
fn find_pair(
    ledger: &SettlementLedger,
    token_a: Address,
    token_b: Address,
) -> Result<&PoolRecord, AdapterError> {
    ledger
        .pools()
        .find(AmmGeneration::DirectPair, token_a, token_b)
        .next()
        .ok_or(AdapterError::NoPool)
}
