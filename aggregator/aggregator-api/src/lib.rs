//! The API for the swap aggregator: wire types and their ABI encodings
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod error;
pub mod serialization;
mod types;
pub use types::*;

use alloy_primitives::Address;

/// The sentinel address denoting the chain's native asset
pub const NATIVE_ASSET_ADDRESS: Address = Address::ZERO;

/// The number of basis points in one whole unit, i.e. 100%
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Whether the given token address denotes the native asset
pub fn is_native_asset(token: &Address) -> bool {
    *token == NATIVE_ASSET_ADDRESS
}
