//! A JSON description of a ledger, used to seed the binary and tests

use std::path::Path;

use aggregator_api::{
    generation::AmmGeneration, payload::HookPoolKey,
    serialization::u256_string_serialization,
};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::{
    pools::{HookConfig, PoolRecord, DIRECT_PAIR_FEE_PIPS},
    BlockContext, SettlementLedger,
};
use crate::error::SwapError;

/// A token balance seeded into the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceFixture {
    /// The token held
    pub token: Address,
    /// The holder
    pub account: Address,
    /// The amount held
    #[serde(with = "u256_string_serialization")]
    pub amount: U256,
}

/// An allowance seeded into the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceFixture {
    /// The approved token
    pub token: Address,
    /// The owner of the tokens
    pub owner: Address,
    /// The approved spender
    pub spender: Address,
    /// The approved amount
    #[serde(with = "u256_string_serialization")]
    pub amount: U256,
}

/// A pool seeded into the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolFixture {
    /// The pool's generation
    pub generation: AmmGeneration,
    /// One token of the pair
    pub token_a: Address,
    /// The other token of the pair
    pub token_b: Address,
    /// The reserve of `token_a`
    #[serde(with = "u256_string_serialization")]
    pub reserve_a: U256,
    /// The reserve of `token_b`
    #[serde(with = "u256_string_serialization")]
    pub reserve_b: U256,
    /// The LP fee in hundredths of a basis point; ignored for direct pairs
    #[serde(default)]
    pub fee_pips: Option<u32>,
    /// The pool's hook, hook-enabled pools only
    #[serde(default)]
    pub hook: Option<HookConfig>,
}

impl PoolFixture {
    /// Build the pool record this fixture describes
    pub fn to_record(&self) -> Result<PoolRecord, SwapError> {
        let fee = self.fee_pips;
        let record = match self.generation {
            AmmGeneration::DirectPair => {
                if fee.is_some_and(|f| f != DIRECT_PAIR_FEE_PIPS) {
                    return Err(SwapError::config("direct pair pools have a fixed fee"));
                }
                PoolRecord::direct_pair(self.token_a, self.token_b)
            },
            AmmGeneration::FeeTiered => {
                let fee = fee.ok_or_else(|| SwapError::config("fee tiered pool without a tier"))?;
                PoolRecord::fee_tiered(self.token_a, self.token_b, fee)
            },
            AmmGeneration::HookEnabled => {
                let fee = fee.ok_or_else(|| SwapError::config("hook pool without a fee"))?;
                let (hooks, hook_fee_bps) =
                    self.hook.map(|h| (h.address, h.fee_bps)).unwrap_or((Address::ZERO, 0));
                let key = HookPoolKey::new(self.token_a, self.token_b, fee, hooks);
                PoolRecord::hook_enabled(&key, hook_fee_bps)
            },
        };

        Ok(record)
    }

    /// The reserves ordered to match the record's `(token0, token1)`
    fn ordered_reserves(&self, record: &PoolRecord) -> (U256, U256) {
        if record.token0 == self.token_a {
            (self.reserve_a, self.reserve_b)
        } else {
            (self.reserve_b, self.reserve_a)
        }
    }
}

/// A full ledger description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerFixture {
    /// The block to start at
    #[serde(default)]
    pub block: BlockContext,
    /// Tokens known to the ledger beyond those referenced elsewhere
    #[serde(default)]
    pub tokens: Vec<Address>,
    /// Seeded balances
    #[serde(default)]
    pub balances: Vec<BalanceFixture>,
    /// Seeded allowances
    #[serde(default)]
    pub allowances: Vec<AllowanceFixture>,
    /// Seeded pools
    #[serde(default)]
    pub pools: Vec<PoolFixture>,
    /// Accounts that reject the native asset
    #[serde(default)]
    pub non_receiving: Vec<Address>,
}

impl LedgerFixture {
    /// Read a fixture from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, SwapError> {
        let contents = std::fs::read_to_string(path).map_err(SwapError::config)?;
        serde_json::from_str(&contents).map_err(SwapError::config)
    }

    /// Build the ledger the fixture describes
    pub fn build(&self) -> Result<SettlementLedger, SwapError> {
        let mut ledger = SettlementLedger::new(self.block);
        for token in &self.tokens {
            ledger.register_token(*token);
        }

        for pool in &self.pools {
            let record = pool.to_record()?;
            let (reserve0, reserve1) = pool.ordered_reserves(&record);
            ledger.add_pool(record, reserve0, reserve1)?;
        }

        for balance in &self.balances {
            ledger.mint(balance.token, balance.account, balance.amount)?;
        }

        for allowance in &self.allowances {
            ledger.approve(allowance.token, allowance.owner, allowance.spender, allowance.amount);
        }

        for account in &self.non_receiving {
            ledger.mark_non_receiving(*account);
        }

        Ok(ledger)
    }
}
