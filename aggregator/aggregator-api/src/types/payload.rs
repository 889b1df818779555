//! ABI definitions and codecs for the opaque, version-specific route payloads
//!
//! Each generation owns the encoding of its route data blob. The blob is built
//! once at quote time and consumed verbatim at execution time, so execution
//! never re-derives routing information.
#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::{sol, SolType, SolValue};

use crate::{error::ApiError, generation::AmmGeneration};

sol! {
    /// The full token path of a direct pair route, endpoints included
    #[derive(Debug, PartialEq, Eq)]
    struct DirectPairRouteData {
        address[] path;
    }

    /// The pool and fee tier of a fee-tiered route
    #[derive(Debug, PartialEq, Eq)]
    struct FeeTieredRouteData {
        address pool;
        uint32 fee;
    }

    /// The identity of a hook-enabled pool
    #[derive(Debug, PartialEq, Eq)]
    struct HookPoolKey {
        address currency0;
        address currency1;
        uint32 fee;
        address hooks;
    }

    /// The intermediate tokens of a direct pair route
    #[derive(Debug, PartialEq, Eq)]
    struct IntermediatePath {
        address[] tokens;
    }

    /// The fee tier of a fee-tiered route
    #[derive(Debug, PartialEq, Eq)]
    struct FeeTierPayload {
        uint32 fee;
    }
}

impl HookPoolKey {
    /// Build a pool key, ordering the currencies canonically
    pub fn new(token_a: Address, token_b: Address, fee: u32, hooks: Address) -> Self {
        let (currency0, currency1) =
            if token_a < token_b { (token_a, token_b) } else { (token_b, token_a) };
        Self { currency0, currency1, fee, hooks }
    }

    /// The pool identity, the hash of the encoded key
    pub fn pool_id(&self) -> B256 {
        keccak256(self.abi_encode())
    }

    /// The hook data carried on routes through this pool, empty when the
    /// pool has no hook
    pub fn hook_data(&self) -> Bytes {
        if self.hooks == Address::ZERO {
            Bytes::new()
        } else {
            Bytes::copy_from_slice(self.hooks.as_slice())
        }
    }

    /// Encode the key as a route data blob
    pub fn to_route_data(&self) -> Bytes {
        Bytes::from(self.abi_encode_params())
    }

    /// Decode a key from a route data blob
    pub fn from_route_data(data: &[u8]) -> Result<Self, ApiError> {
        <HookPoolKey as SolType>::abi_decode_params(data).map_err(ApiError::abi_decode)
    }
}

/// Encode the full path of a direct pair route
pub fn encode_direct_pair_route(path: &[Address]) -> Bytes {
    Bytes::from(DirectPairRouteData { path: path.to_vec() }.abi_encode_params())
}

/// Decode the full path of a direct pair route
pub fn decode_direct_pair_route(data: &[u8]) -> Result<Vec<Address>, ApiError> {
    let decoded = <DirectPairRouteData as SolType>::abi_decode_params(data)?;
    Ok(decoded.path)
}

/// Encode the pool and fee tier of a fee-tiered route
pub fn encode_fee_tiered_route(pool: Address, fee: u32) -> Bytes {
    Bytes::from(FeeTieredRouteData { pool, fee }.abi_encode_params())
}

/// Decode the pool and fee tier of a fee-tiered route
pub fn decode_fee_tiered_route(data: &[u8]) -> Result<(Address, u32), ApiError> {
    let decoded = <FeeTieredRouteData as SolType>::abi_decode_params(data)?;
    Ok((decoded.pool, decoded.fee))
}

// ---------------------
// | Execution Payload |
// ---------------------

/// The single version-specific payload carried by an execution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPayload {
    /// The intermediate tokens of a direct pair route
    Path(Vec<Address>),
    /// The fee tier of a fee-tiered route
    FeeTier(u32),
    /// The route data blob of a hook-enabled route, used unmodified
    RouteData(Bytes),
}

impl VersionPayload {
    /// ABI-encode the payload
    pub fn encode(&self) -> Bytes {
        match self {
            VersionPayload::Path(tokens) => {
                Bytes::from(IntermediatePath { tokens: tokens.clone() }.abi_encode_params())
            },
            VersionPayload::FeeTier(fee) => {
                Bytes::from(FeeTierPayload { fee: *fee }.abi_encode_params())
            },
            VersionPayload::RouteData(data) => data.clone(),
        }
    }

    /// Decode the payload for the given generation
    pub fn decode(generation: AmmGeneration, data: &[u8]) -> Result<Self, ApiError> {
        match generation {
            AmmGeneration::DirectPair => {
                let path = <IntermediatePath as SolType>::abi_decode_params(data)?;
                Ok(VersionPayload::Path(path.tokens))
            },
            AmmGeneration::FeeTiered => {
                let payload = <FeeTierPayload as SolType>::abi_decode_params(data)?;
                Ok(VersionPayload::FeeTier(payload.fee))
            },
            AmmGeneration::HookEnabled => {
                Ok(VersionPayload::RouteData(Bytes::copy_from_slice(data)))
            },
        }
    }
}
