//! The route type shared between quoting and execution

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    generation::AmmGeneration,
    payload::{decode_direct_pair_route, encode_direct_pair_route, HookPoolKey, VersionPayload},
};

/// The fee tier value reported for generations without fee tiers
pub const NO_FEE_TIER: u32 = 0;

/// A route through a single AMM generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRoute {
    /// The token being sold
    pub token_in: Address,
    /// The token being bought
    pub token_out: Address,
    /// The generation the route executes on
    pub generation: AmmGeneration,
    /// The pool fee tier, in hundredths of a basis point
    ///
    /// Only meaningful for fee-tiered routes, `NO_FEE_TIER` otherwise
    pub fee_tier: u32,
    /// The intermediate tokens of a multi-hop path, empty for single hops
    pub path: Vec<Address>,
    /// The route-specific data blob, understood only by the matching adapter
    pub route_data: Bytes,
    /// The hook-specific data blob, empty unless the route carries a hook
    pub hook_data: Bytes,
}

impl SwapRoute {
    /// The version-specific payload to place in an execution request
    pub fn execution_payload(&self) -> VersionPayload {
        match self.generation {
            AmmGeneration::DirectPair => VersionPayload::Path(self.path.clone()),
            AmmGeneration::FeeTiered => VersionPayload::FeeTier(self.fee_tier),
            AmmGeneration::HookEnabled => VersionPayload::RouteData(self.route_data.clone()),
        }
    }

    /// Rebuild a route from the payload of an execution request
    ///
    /// The fee-tiered payload only names the tier, so the returned route
    /// carries no pool in its route data; the adapter resolves the pool from
    /// the pair and tier.
    pub fn from_execution_payload(
        token_in: Address,
        token_out: Address,
        generation: AmmGeneration,
        payload: VersionPayload,
    ) -> Result<Self, ApiError> {
        let mut route = SwapRoute {
            token_in,
            token_out,
            generation,
            fee_tier: NO_FEE_TIER,
            path: Vec::new(),
            route_data: Bytes::new(),
            hook_data: Bytes::new(),
        };

        match (generation, payload) {
            (AmmGeneration::DirectPair, VersionPayload::Path(intermediates)) => {
                let mut full_path = Vec::with_capacity(intermediates.len() + 2);
                full_path.push(token_in);
                full_path.extend(intermediates.iter().copied());
                full_path.push(token_out);

                route.route_data = encode_direct_pair_route(&full_path);
                route.path = intermediates;
            },
            (AmmGeneration::FeeTiered, VersionPayload::FeeTier(fee)) => {
                route.fee_tier = fee;
            },
            (AmmGeneration::HookEnabled, VersionPayload::RouteData(data)) => {
                let key = HookPoolKey::from_route_data(&data)?;
                route.hook_data = key.hook_data();
                route.route_data = data;
            },
            (generation, payload) => {
                return Err(ApiError::abi_decode(format!(
                    "payload {payload:?} does not match generation {generation}"
                )));
            },
        }

        Ok(route)
    }

    /// The full token path of the route, endpoints included
    pub fn full_path(&self) -> Result<Vec<Address>, ApiError> {
        match self.generation {
            AmmGeneration::DirectPair if !self.route_data.is_empty() => {
                decode_direct_pair_route(&self.route_data)
            },
            _ => {
                let mut path = vec![self.token_in];
                path.extend(self.path.iter().copied());
                path.push(self.token_out);
                Ok(path)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An execution payload carries enough to rebuild a direct pair path
    #[test]
    fn test_direct_pair_route_from_payload() {
        let token_in = Address::repeat_byte(0x01);
        let mid = Address::repeat_byte(0x02);
        let token_out = Address::repeat_byte(0x03);

        let route = SwapRoute::from_execution_payload(
            token_in,
            token_out,
            AmmGeneration::DirectPair,
            VersionPayload::Path(vec![mid]),
        )
        .unwrap();

        assert_eq!(route.full_path().unwrap(), vec![token_in, mid, token_out]);
        assert_eq!(route.fee_tier, NO_FEE_TIER);
    }

    /// A payload of the wrong shape for the generation is rejected
    #[test]
    fn test_mismatched_payload() {
        let res = SwapRoute::from_execution_payload(
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            AmmGeneration::FeeTiered,
            VersionPayload::Path(vec![]),
        );
        assert!(res.is_err());
    }
}
