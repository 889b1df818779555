//! The settlement ledger: the chain state a swap reads and mutates
//!
//! Balances are keyed by `(token, account)`, with the native asset keyed by
//! the native sentinel address. Pool reserves are the balances of each pool's
//! account, so executing against a pool moves ledger balances exactly the way
//! a transfer does.
//!
//! The ledger is `Clone`; the executor snapshots it before a swap and
//! restores the snapshot if any step fails.

pub mod fixture;
pub mod pools;

use std::collections::{HashMap, HashSet};

use aggregator_api::is_native_asset;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use self::pools::{PoolBook, PoolRecord};

/// An error interacting with the settlement ledger
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// An account does not hold enough of a token
    #[error("insufficient balance of {token} for {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        /// The token being moved
        token: Address,
        /// The account being debited
        account: Address,
        /// The amount requested
        needed: U256,
        /// The amount held
        available: U256,
    },
    /// A spender has not been approved for enough of a token
    #[error("insufficient allowance of {token} from {owner} to {spender}: needed {needed}, available {available}")]
    InsufficientAllowance {
        /// The token being moved
        token: Address,
        /// The account whose tokens are moved
        owner: Address,
        /// The account moving them
        spender: Address,
        /// The amount requested
        needed: U256,
        /// The amount approved
        available: U256,
    },
    /// The receiving account refuses native asset transfers
    #[error("native asset transfer rejected by {0}")]
    NativeTransferRejected(Address),
    /// A credit would overflow the account balance
    #[error("balance overflow")]
    BalanceOverflow,
    /// No pool is registered under the given id
    #[error("unknown pool: {0}")]
    UnknownPool(B256),
}

/// The block the engine is executing in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    /// The block number
    pub number: u64,
    /// The block timestamp, in seconds since the epoch
    pub timestamp: u64,
}

/// The in-process model of the chain state a swap settles against
#[derive(Debug, Clone, Default)]
pub struct SettlementLedger {
    /// Token balances, keyed by `(token, account)`
    balances: HashMap<(Address, Address), U256>,
    /// Allowances, keyed by `(token, owner, spender)`
    allowances: HashMap<(Address, Address, Address), U256>,
    /// The non-native tokens the ledger knows about
    tokens: HashSet<Address>,
    /// Accounts that reject native asset transfers
    non_receiving: HashSet<Address>,
    /// The current block
    block: BlockContext,
    /// The cumulative gas estimate charged against the ledger
    gas_used: u64,
    /// The ids of swaps already settled
    seen_swaps: HashSet<B256>,
    /// The consumed metadata nonces, keyed by `(integrator, payer, nonce)`
    used_nonces: HashSet<(String, Address, U256)>,
    /// The registered pools
    pools: PoolBook,
}

impl SettlementLedger {
    /// Create an empty ledger at the given block
    pub fn new(block: BlockContext) -> Self {
        Self { block, ..Default::default() }
    }

    // ----------
    // | Tokens |
    // ----------

    /// Register a token with the ledger
    pub fn register_token(&mut self, token: Address) {
        if !is_native_asset(&token) {
            self.tokens.insert(token);
        }
    }

    /// Whether the token is the native asset or a registered token
    pub fn is_known_token(&self, token: &Address) -> bool {
        is_native_asset(token) || self.tokens.contains(token)
    }

    /// Mark an account as refusing native asset transfers
    pub fn mark_non_receiving(&mut self, account: Address) {
        self.non_receiving.insert(account);
    }

    // ------------
    // | Balances |
    // ------------

    /// The balance of `token` held by `account`
    pub fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.balances.get(&(token, account)).copied().unwrap_or(U256::ZERO)
    }

    /// Credit an account with newly issued tokens
    pub fn mint(
        &mut self,
        token: Address,
        account: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        self.register_token(token);
        self.credit(token, account, amount)
    }

    /// Move `amount` of `token` between two accounts
    ///
    /// Zero-amount transfers are no-ops
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }

        if is_native_asset(&token) && self.non_receiving.contains(&to) {
            return Err(LedgerError::NativeTransferRejected(to));
        }

        self.debit(token, from, amount)?;
        self.credit(token, to, amount)
    }

    /// Set the allowance of `spender` over `owner`'s tokens
    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    /// The allowance of `spender` over `owner`'s tokens
    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(token, owner, spender)).copied().unwrap_or(U256::ZERO)
    }

    /// Move `owner`'s tokens on behalf of `spender`, consuming allowance
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        owner: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let available = self.allowance(token, owner, spender);
        if available < amount {
            return Err(LedgerError::InsufficientAllowance {
                token,
                owner,
                spender,
                needed: amount,
                available,
            });
        }

        self.transfer(token, owner, to, amount)?;
        self.allowances.insert((token, owner, spender), available - amount);
        Ok(())
    }

    /// Debit an account
    fn debit(&mut self, token: Address, account: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.balance_of(token, account);
        let remaining = available.checked_sub(amount).ok_or(LedgerError::InsufficientBalance {
            token,
            account,
            needed: amount,
            available,
        })?;

        self.balances.insert((token, account), remaining);
        Ok(())
    }

    /// Credit an account
    fn credit(
        &mut self,
        token: Address,
        account: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let balance = self.balance_of(token, account);
        let updated = balance.checked_add(amount).ok_or(LedgerError::BalanceOverflow)?;
        self.balances.insert((token, account), updated);
        Ok(())
    }

    // ---------
    // | Pools |
    // ---------

    /// Register a pool and seed its reserves
    pub fn add_pool(
        &mut self,
        pool: PoolRecord,
        reserve0: U256,
        reserve1: U256,
    ) -> Result<B256, LedgerError> {
        self.mint(pool.token0, pool.account, reserve0)?;
        self.mint(pool.token1, pool.account, reserve1)?;
        Ok(self.pools.insert(pool))
    }

    /// The registered pools
    pub fn pools(&self) -> &PoolBook {
        &self.pools
    }

    /// Look up a pool by id
    pub fn pool(&self, id: &B256) -> Result<&PoolRecord, LedgerError> {
        self.pools.get(id).ok_or(LedgerError::UnknownPool(*id))
    }

    /// The reserves of a pool, ordered `(reserve_in, reserve_out)` for a trade
    /// selling `token_in`
    pub fn reserves(&self, pool: &PoolRecord, token_in: Address) -> (U256, U256) {
        let token_out = if token_in == pool.token0 { pool.token1 } else { pool.token0 };
        (self.balance_of(token_in, pool.account), self.balance_of(token_out, pool.account))
    }

    // ---------------------
    // | Block and Replays |
    // ---------------------

    /// The current block
    pub fn block(&self) -> BlockContext {
        self.block
    }

    /// Move to the next block, `seconds` after the current one
    pub fn advance_block(&mut self, seconds: u64) {
        self.block.number += 1;
        self.block.timestamp += seconds;
    }

    /// Charge a gas estimate against the ledger
    pub fn charge_gas(&mut self, gas: u64) {
        self.gas_used = self.gas_used.saturating_add(gas);
    }

    /// The cumulative gas charged so far
    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    /// Record a settled swap id, returning false if it was already recorded
    pub fn record_swap(&mut self, swap_id: B256) -> bool {
        self.seen_swaps.insert(swap_id)
    }

    /// Whether a swap id has been recorded
    pub fn has_swap(&self, swap_id: &B256) -> bool {
        self.seen_swaps.contains(swap_id)
    }

    /// Consume a nonce, returning false if it was already consumed
    pub fn consume_nonce(&mut self, integrator: &str, payer: Address, nonce: U256) -> bool {
        self.used_nonces.insert((integrator.to_string(), payer, nonce))
    }

    /// Whether a nonce has been consumed
    pub fn is_nonce_used(&self, integrator: &str, payer: Address, nonce: U256) -> bool {
        self.used_nonces.contains(&(integrator.to_string(), payer, nonce))
    }
}

#[cfg(test)]
mod tests {
    use aggregator_api::NATIVE_ASSET_ADDRESS;

    use super::*;

    /// A failed transfer leaves both balances untouched
    #[test]
    fn test_transfer_insufficient_balance() {
        let token = Address::repeat_byte(0x01);
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);

        let mut ledger = SettlementLedger::default();
        ledger.mint(token, alice, U256::from(10u64)).unwrap();

        let err = ledger.transfer(token, alice, bob, U256::from(11u64)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(token, alice), U256::from(10u64));
        assert_eq!(ledger.balance_of(token, bob), U256::ZERO);
    }

    /// Allowances are consumed by `transfer_from`
    #[test]
    fn test_transfer_from_consumes_allowance() {
        let token = Address::repeat_byte(0x01);
        let owner = Address::repeat_byte(0xa1);
        let spender = Address::repeat_byte(0xe0);

        let mut ledger = SettlementLedger::default();
        ledger.mint(token, owner, U256::from(100u64)).unwrap();
        ledger.approve(token, owner, spender, U256::from(60u64));

        ledger.transfer_from(token, spender, owner, spender, U256::from(40u64)).unwrap();
        assert_eq!(ledger.allowance(token, owner, spender), U256::from(20u64));

        let err =
            ledger.transfer_from(token, spender, owner, spender, U256::from(40u64)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
    }

    /// Non-receiving accounts reject the native asset but not tokens
    #[test]
    fn test_non_receiving_account() {
        let token = Address::repeat_byte(0x01);
        let payer = Address::repeat_byte(0xa1);
        let sink = Address::repeat_byte(0x5c);

        let mut ledger = SettlementLedger::default();
        ledger.mint(NATIVE_ASSET_ADDRESS, payer, U256::from(5u64)).unwrap();
        ledger.mint(token, payer, U256::from(5u64)).unwrap();
        ledger.mark_non_receiving(sink);

        let err = ledger.transfer(NATIVE_ASSET_ADDRESS, payer, sink, U256::from(1u64)).unwrap_err();
        assert_eq!(err, LedgerError::NativeTransferRejected(sink));
        ledger.transfer(token, payer, sink, U256::from(1u64)).unwrap();

        // Nothing is sent, so nothing is rejected
        ledger.transfer(NATIVE_ASSET_ADDRESS, payer, sink, U256::ZERO).unwrap();
    }

    /// Nonces are scoped to the integrator and payer
    #[test]
    fn test_nonce_scoping() {
        let payer = Address::repeat_byte(0xa1);
        let mut ledger = SettlementLedger::default();

        assert!(ledger.consume_nonce("frontend", payer, U256::from(1u64)));
        assert!(!ledger.consume_nonce("frontend", payer, U256::from(1u64)));
        assert!(ledger.consume_nonce("partner", payer, U256::from(1u64)));
        assert!(ledger.consume_nonce("frontend", Address::repeat_byte(0xa2), U256::from(1u64)));
    }
}
