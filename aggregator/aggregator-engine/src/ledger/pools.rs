//! Pool records and the pool book

use std::collections::{BTreeMap, BTreeSet};

use aggregator_api::{generation::AmmGeneration, payload::HookPoolKey};
use alloy_primitives::{keccak256, Address, B256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// The fee charged by every direct pair pool, in hundredths of a basis point
pub const DIRECT_PAIR_FEE_PIPS: u32 = 3000;

/// A hook attached to a hook-enabled pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// The hook contract
    pub address: Address,
    /// The fee the hook takes from the swap output, in basis points
    #[serde(default)]
    pub fee_bps: u64,
}

/// A liquidity pool registered with the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRecord {
    /// The pool identity
    pub id: B256,
    /// The generation the pool belongs to
    pub generation: AmmGeneration,
    /// The account holding the pool's reserves
    pub account: Address,
    /// The lesser of the pool's two tokens
    pub token0: Address,
    /// The greater of the pool's two tokens
    pub token1: Address,
    /// The LP fee, in hundredths of a basis point
    pub fee_pips: u32,
    /// The hook attached to the pool, hook-enabled pools only
    pub hook: Option<HookConfig>,
}

impl PoolRecord {
    /// A direct pair pool between two tokens
    pub fn direct_pair(token_a: Address, token_b: Address) -> Self {
        let (token0, token1) = sort_tokens(token_a, token_b);
        let tag = u16::from(AmmGeneration::DirectPair.tag());
        let id = keccak256((tag, token0, token1, DIRECT_PAIR_FEE_PIPS).abi_encode());

        Self::from_parts(id, AmmGeneration::DirectPair, token0, token1, DIRECT_PAIR_FEE_PIPS, None)
    }

    /// A fee-tiered pool between two tokens at the given tier
    pub fn fee_tiered(token_a: Address, token_b: Address, fee_pips: u32) -> Self {
        let (token0, token1) = sort_tokens(token_a, token_b);
        let tag = u16::from(AmmGeneration::FeeTiered.tag());
        let id = keccak256((tag, token0, token1, fee_pips).abi_encode());

        Self::from_parts(id, AmmGeneration::FeeTiered, token0, token1, fee_pips, None)
    }

    /// A hook-enabled pool identified by its pool key
    pub fn hook_enabled(key: &HookPoolKey, hook_fee_bps: u64) -> Self {
        let hook = (key.hooks != Address::ZERO)
            .then_some(HookConfig { address: key.hooks, fee_bps: hook_fee_bps });

        Self::from_parts(
            key.pool_id(),
            AmmGeneration::HookEnabled,
            key.currency0,
            key.currency1,
            key.fee,
            hook,
        )
    }

    /// Assemble a record, deriving the reserve account from the id
    fn from_parts(
        id: B256,
        generation: AmmGeneration,
        token0: Address,
        token1: Address,
        fee_pips: u32,
        hook: Option<HookConfig>,
    ) -> Self {
        let account = Address::from_word(id);
        Self { id, generation, account, token0, token1, fee_pips, hook }
    }

    /// The pool key of a hook-enabled pool
    pub fn hook_key(&self) -> HookPoolKey {
        let hooks = self.hook.map(|h| h.address).unwrap_or(Address::ZERO);
        HookPoolKey::new(self.token0, self.token1, self.fee_pips, hooks)
    }

    /// Whether the pool trades the given pair, in either direction
    pub fn trades_pair(&self, token_a: Address, token_b: Address) -> bool {
        sort_tokens(token_a, token_b) == (self.token0, self.token1)
    }
}

/// Order two tokens canonically
pub fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

/// The set of pools registered with the ledger, keyed by id
#[derive(Debug, Clone, Default)]
pub struct PoolBook {
    /// The pools, ordered by id so iteration is deterministic
    pools: BTreeMap<B256, PoolRecord>,
}

impl PoolBook {
    /// Insert a pool, returning its id
    pub fn insert(&mut self, pool: PoolRecord) -> B256 {
        let id = pool.id;
        self.pools.insert(id, pool);
        id
    }

    /// Look up a pool by id
    pub fn get(&self, id: &B256) -> Option<&PoolRecord> {
        self.pools.get(id)
    }

    /// The generation of the pool with the given id
    pub fn generation_of(&self, id: &B256) -> Option<AmmGeneration> {
        self.pools.get(id).map(|pool| pool.generation)
    }

    /// All pools of a generation trading the given pair
    pub fn find(
        &self,
        generation: AmmGeneration,
        token_a: Address,
        token_b: Address,
    ) -> impl Iterator<Item = &PoolRecord> {
        self.pools
            .values()
            .filter(move |pool| pool.generation == generation && pool.trades_pair(token_a, token_b))
    }

    /// The tokens sharing a pool of any generation with `token`
    pub fn neighbours(&self, token: Address) -> BTreeSet<Address> {
        self.pools
            .values()
            .filter_map(|pool| match token {
                t if t == pool.token0 => Some(pool.token1),
                t if t == pool.token1 => Some(pool.token0),
                _ => None,
            })
            .collect()
    }
}
