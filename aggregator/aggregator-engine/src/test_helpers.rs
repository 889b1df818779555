//! Fixtures and mock adapters shared by the engine's tests

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use aggregator_api::{
    generation::AmmGeneration,
    payload::HookPoolKey,
    quote::QuoteRequest,
    route::{SwapRoute, NO_FEE_TIER},
    NATIVE_ASSET_ADDRESS,
};
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::{
    config::EngineConfig,
    ledger::{pools::PoolRecord, BlockContext, SettlementLedger},
    swap::SwapEngine,
    venues::{
        direct_pair::DirectPairAdapter, fee_tiered::FeeTieredAdapter,
        hook_enabled::HookEnabledAdapter, AdapterError, AdapterRegistry, RouteQuote,
        VersionAdapter,
    },
};

// ------------
// | Accounts |
// ------------

/// A six-decimal stablecoin
pub fn usdc() -> Address {
    Address::repeat_byte(0xaa)
}

/// An eighteen-decimal stablecoin, reachable from native only through USDC
pub fn dai() -> Address {
    Address::repeat_byte(0xda)
}

/// A registered token no pool trades
pub fn unroutable_token() -> Address {
    Address::repeat_byte(0x77)
}

/// The engine's own account
pub fn engine_account() -> Address {
    Address::repeat_byte(0xee)
}

/// The admin permitted to update the platform config
pub fn admin() -> Address {
    Address::repeat_byte(0xad)
}

/// The account paying for swaps
pub fn payer() -> Address {
    Address::repeat_byte(0x11)
}

/// The platform fee recipient
pub fn fee_recipient() -> Address {
    Address::repeat_byte(0xfe)
}

/// The referrer
pub fn referrer() -> Address {
    Address::repeat_byte(0x0f)
}

/// The hook attached to the hook-enabled pool
pub fn hook_address() -> Address {
    Address::repeat_byte(0x40)
}

/// `n` whole units of an eighteen-decimal token
pub fn wad(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

/// `n` whole units of a six-decimal token
pub fn usdc_units(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000u64)
}

// ----------
// | Ledger |
// ----------

/// The fee the hook takes, in basis points
pub const HOOK_FEE_BPS: u64 = 10;

/// A ledger with one pool per generation on the native/USDC pair, a shallow
/// second fee tier, and a USDC/DAI pair
///
/// The payer holds ten native units and one hundred thousand USDC, the latter
/// approved to the engine
pub fn mock_ledger() -> SettlementLedger {
    let mut ledger = SettlementLedger::new(BlockContext { number: 100, timestamp: 1_700_000_000 });
    ledger.register_token(usdc());
    ledger.register_token(dai());
    ledger.register_token(unroutable_token());

    let native = NATIVE_ASSET_ADDRESS;
    let pools = [
        (PoolRecord::direct_pair(native, usdc()), native, wad(1_000), usdc_units(2_000_000)),
        (
            PoolRecord::fee_tiered(native, usdc(), 3000),
            native,
            wad(2_000),
            usdc_units(4_100_000),
        ),
        (PoolRecord::fee_tiered(native, usdc(), 500), native, wad(10), usdc_units(20_000)),
        (
            PoolRecord::hook_enabled(
                &HookPoolKey::new(native, usdc(), 500, hook_address()),
                HOOK_FEE_BPS,
            ),
            native,
            wad(500),
            usdc_units(1_000_000),
        ),
        (
            PoolRecord::direct_pair(usdc(), dai()),
            usdc(),
            usdc_units(10_000_000),
            wad(10_000_000),
        ),
    ];
    for (pool, token_a, reserve_a, reserve_b) in pools {
        let (reserve0, reserve1) = if pool.token0 == token_a {
            (reserve_a, reserve_b)
        } else {
            (reserve_b, reserve_a)
        };
        ledger.add_pool(pool, reserve0, reserve1).unwrap();
    }

    ledger.mint(NATIVE_ASSET_ADDRESS, payer(), wad(10)).unwrap();
    ledger.mint(usdc(), payer(), usdc_units(100_000)).unwrap();
    ledger.approve(usdc(), payer(), engine_account(), U256::MAX);
    ledger
}

/// The default adapter registry: every generation, no intermediates
pub fn default_registry() -> AdapterRegistry {
    AdapterRegistry::new(vec![
        Arc::new(DirectPairAdapter::default()),
        Arc::new(FeeTieredAdapter::default()),
        Arc::new(HookEnabledAdapter),
    ])
}

/// The default engine config with a ten basis point platform fee
pub fn engine_config() -> EngineConfig {
    let mut config = EngineConfig::new(engine_account(), admin());
    config.platform.platform_fee_bps = 10;
    config.platform.fee_recipient = fee_recipient();
    config
}

/// An engine over the mock ledger
pub fn mock_engine() -> SwapEngine {
    SwapEngine::new(&engine_config(), mock_ledger()).unwrap()
}

// -----------------
// | Mock Adapters |
// -----------------

/// An adapter that fails every call
pub struct FailingAdapter(pub AmmGeneration);

#[async_trait]
impl VersionAdapter for FailingAdapter {
    fn generation(&self) -> AmmGeneration {
        self.0
    }

    async fn get_quote(
        &self,
        _ledger: &SettlementLedger,
        _request: &QuoteRequest,
    ) -> Result<RouteQuote, AdapterError> {
        Err(AdapterError::custom("venue unavailable"))
    }

    async fn execute(
        &self,
        _ledger: &mut SettlementLedger,
        _route: &SwapRoute,
        _amount_in: U256,
        _trader: Address,
    ) -> Result<U256, AdapterError> {
        Err(AdapterError::custom("venue unavailable"))
    }
}

/// An adapter quoting a fixed output and gas for any pair
pub struct FixedQuoteAdapter {
    /// The generation served
    generation: AmmGeneration,
    /// The output quoted
    amount_out: U256,
    /// The gas quoted
    gas_estimate: u64,
}

impl FixedQuoteAdapter {
    /// Constructor
    pub fn new(generation: AmmGeneration, amount_out: U256, gas_estimate: u64) -> Self {
        Self { generation, amount_out, gas_estimate }
    }
}

#[async_trait]
impl VersionAdapter for FixedQuoteAdapter {
    fn generation(&self) -> AmmGeneration {
        self.generation
    }

    async fn get_quote(
        &self,
        _ledger: &SettlementLedger,
        request: &QuoteRequest,
    ) -> Result<RouteQuote, AdapterError> {
        let route = SwapRoute {
            token_in: request.token_in,
            token_out: request.token_out,
            generation: self.generation,
            fee_tier: NO_FEE_TIER,
            path: Vec::new(),
            route_data: Bytes::new(),
            hook_data: Bytes::new(),
        };

        Ok(RouteQuote {
            route,
            amount_out: self.amount_out,
            liquidity: self.amount_out,
            gas_estimate: self.gas_estimate,
            pools: Vec::new(),
        })
    }

    async fn execute(
        &self,
        _ledger: &mut SettlementLedger,
        _route: &SwapRoute,
        _amount_in: U256,
        _trader: Address,
    ) -> Result<U256, AdapterError> {
        Err(AdapterError::custom("fixed quotes do not execute"))
    }
}

/// An adapter counting the quotes and executions requested of it, failing
/// each one
pub struct CountingAdapter {
    /// The generation served
    generation: AmmGeneration,
    /// The number of calls made
    calls: Arc<AtomicUsize>,
}

impl CountingAdapter {
    /// Constructor
    pub fn new(generation: AmmGeneration, calls: Arc<AtomicUsize>) -> Self {
        Self { generation, calls }
    }
}

#[async_trait]
impl VersionAdapter for CountingAdapter {
    fn generation(&self) -> AmmGeneration {
        self.generation
    }

    async fn get_quote(
        &self,
        _ledger: &SettlementLedger,
        _request: &QuoteRequest,
    ) -> Result<RouteQuote, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AdapterError::NoPool)
    }

    async fn execute(
        &self,
        _ledger: &mut SettlementLedger,
        _route: &SwapRoute,
        _amount_in: U256,
        _trader: Address,
    ) -> Result<U256, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AdapterError::NoPool)
    }
}
