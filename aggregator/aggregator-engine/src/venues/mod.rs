//! Generation-specific logic for pricing and executing routes
//!
//! Each AMM generation is served by one [`VersionAdapter`]. Adapters are
//! stateless with respect to swaps: they read pools from the settlement
//! ledger at quote time and move ledger balances at execution time.

use std::{collections::BTreeMap, sync::Arc};

use aggregator_api::{
    error::ApiError,
    generation::AmmGeneration,
    quote::{QuoteRequest, QuoteResponse},
    route::SwapRoute,
};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::{
    config::AdapterConfig,
    ledger::{pools::PoolRecord, LedgerError, SettlementLedger},
};

pub mod amm_math;
pub mod direct_pair;
pub mod fee_tiered;
pub mod hook_enabled;

use self::{
    amm_math::get_amount_out, direct_pair::DirectPairAdapter, fee_tiered::FeeTieredAdapter,
    hook_enabled::HookEnabledAdapter,
};

/// An error raised by a venue adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// No pool of the adapter's generation trades the pair
    #[error("no pool for pair")]
    NoPool,
    /// The pool cannot fill the trade
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    /// A pool trades the pair but the amount is too small to yield any output
    #[error("amount too small to price")]
    DustAmount,
    /// The pool hint names a pool this adapter does not own
    #[error("pool hint {0} does not belong to this adapter")]
    ForeignPoolHint(B256),
    /// The route data could not be interpreted
    #[error("route data error: {0}")]
    RouteData(String),
    /// An intermediate value overflowed
    #[error("arithmetic overflow")]
    Overflow,
    /// An error moving ledger balances
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
    /// Any other adapter failure
    #[error("adapter error: {0}")]
    Custom(String),
}

impl AdapterError {
    /// Create a new route data error
    #[allow(clippy::needless_pass_by_value)]
    pub fn route_data<T: ToString>(e: T) -> Self {
        AdapterError::RouteData(e.to_string())
    }

    /// Create a new custom error
    #[allow(clippy::needless_pass_by_value)]
    pub fn custom<T: ToString>(e: T) -> Self {
        AdapterError::Custom(e.to_string())
    }

    /// The error reported when no candidate route priced: `DustAmount` if
    /// any candidate failed only for the amount's size, else `NoPool`
    pub fn unquoted(dust_seen: bool) -> Self {
        if dust_seen {
            AdapterError::DustAmount
        } else {
            AdapterError::NoPool
        }
    }
}

impl From<LedgerError> for AdapterError {
    fn from(e: LedgerError) -> Self {
        AdapterError::Ledger(e)
    }
}

impl From<ApiError> for AdapterError {
    fn from(e: ApiError) -> Self {
        AdapterError::route_data(e)
    }
}

/// A priced route produced by an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuote {
    /// The route, with its version payload encoded into the opaque fields
    pub route: SwapRoute,
    /// The output the route is expected to deliver
    pub amount_out: U256,
    /// The output-side reserve depth of the final pool on the route
    pub liquidity: U256,
    /// The estimated gas cost of executing the route
    pub gas_estimate: u64,
    /// The pools the route passes through, in order
    pub pools: Vec<B256>,
}

impl RouteQuote {
    /// The generation that produced this quote
    pub fn generation(&self) -> AmmGeneration {
        self.route.generation
    }

    /// The wire form of the quote
    pub fn to_response(&self) -> QuoteResponse {
        let hook = if self.route.hook_data.len() == std::mem::size_of::<Address>() {
            Address::from_slice(&self.route.hook_data)
        } else {
            Address::ZERO
        };

        QuoteResponse {
            amount_out: self.amount_out,
            liquidity: self.liquidity,
            fee_tier: self.route.fee_tier,
            version: self.route.generation.tag(),
            hook,
            path: self.route.path.clone(),
            route_data: self.route.route_data.clone(),
        }
    }
}

/// The uniform interface over AMM generations: pricing and executing routes
#[async_trait]
pub trait VersionAdapter: Send + Sync {
    /// The generation this adapter serves
    fn generation(&self) -> AmmGeneration;

    /// Price the best route this adapter offers for the request
    async fn get_quote(
        &self,
        ledger: &SettlementLedger,
        request: &QuoteRequest,
    ) -> Result<RouteQuote, AdapterError>;

    /// Execute a route this adapter produced, selling `amount_in` held by
    /// `trader` and delivering the output back to `trader`
    ///
    /// Returns the amount delivered
    async fn execute(
        &self,
        ledger: &mut SettlementLedger,
        route: &SwapRoute,
        amount_in: U256,
        trader: Address,
    ) -> Result<U256, AdapterError>;
}

/// The set of adapters the engine routes through, at most one per generation
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    /// The adapters, ordered by generation ordinal
    adapters: BTreeMap<AmmGeneration, Arc<dyn VersionAdapter>>,
}

impl AdapterRegistry {
    /// Build a registry; a later adapter for a generation replaces an earlier
    /// one
    pub fn new(adapters: Vec<Arc<dyn VersionAdapter>>) -> Self {
        let adapters = adapters.into_iter().map(|a| (a.generation(), a)).collect();
        Self { adapters }
    }

    /// Build the registry described by the adapter config
    pub fn from_config(config: &AdapterConfig) -> Self {
        let mut adapters: Vec<Arc<dyn VersionAdapter>> = Vec::new();
        if config.direct_pair.enabled {
            let intermediates = config.direct_pair.intermediate_tokens.clone();
            adapters.push(Arc::new(DirectPairAdapter::new(intermediates)));
        }
        if config.fee_tiered.enabled {
            adapters.push(Arc::new(FeeTieredAdapter::new(config.fee_tiered.fee_tiers.clone())));
        }
        if config.hook_enabled.enabled {
            adapters.push(Arc::new(HookEnabledAdapter));
        }

        Self::new(adapters)
    }

    /// Get the adapter serving a generation
    pub fn get_adapter(&self, generation: AmmGeneration) -> Option<Arc<dyn VersionAdapter>> {
        self.adapters.get(&generation).cloned()
    }

    /// Get all adapters, in generation order
    pub fn get_all_adapters(&self) -> Vec<Arc<dyn VersionAdapter>> {
        self.adapters.values().cloned().collect()
    }

    /// The generations served by the registry
    pub fn generations(&self) -> Vec<AmmGeneration> {
        self.adapters.keys().copied().collect()
    }
}

// -----------
// | Helpers |
// -----------

/// Resolve the pool named by a quote hint, checking that it belongs to the
/// given generation and trades the requested pair
pub(crate) fn resolve_hinted_pool<'a>(
    ledger: &'a SettlementLedger,
    generation: AmmGeneration,
    request: &QuoteRequest,
    hint: &B256,
) -> Result<&'a PoolRecord, AdapterError> {
    let pool = ledger.pool(hint).map_err(|_| AdapterError::NoPool)?;
    if pool.generation != generation {
        return Err(AdapterError::ForeignPoolHint(*hint));
    }
    if !pool.trades_pair(request.token_in, request.token_out) {
        return Err(AdapterError::NoPool);
    }

    Ok(pool)
}

/// Price selling `amount_in` of `token_in` into a single pool
///
/// Returns the gross output and the output-side reserve
pub(crate) fn price_pool(
    ledger: &SettlementLedger,
    pool: &PoolRecord,
    token_in: Address,
    amount_in: U256,
) -> Result<(U256, U256), AdapterError> {
    let (reserve_in, reserve_out) = ledger.reserves(pool, token_in);
    let amount_out = get_amount_out(amount_in, reserve_in, reserve_out, pool.fee_pips)?;
    Ok((amount_out, reserve_out))
}

/// Swap `amount_in` of `token_in` held by `from` through a single pool,
/// leaving the gross output in the pool's account
///
/// Returns the gross output; the caller moves it onwards
pub(crate) fn swap_into_pool(
    ledger: &mut SettlementLedger,
    pool: &PoolRecord,
    token_in: Address,
    amount_in: U256,
    from: Address,
) -> Result<U256, AdapterError> {
    let (amount_out, _) = price_pool(ledger, pool, token_in, amount_in)?;
    ledger.transfer(token_in, from, pool.account, amount_in)?;
    Ok(amount_out)
}
