//! API types for quoting

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolType, SolValue};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    generation::{AmmGeneration, NO_ROUTE_TAG},
    route::{SwapRoute, NO_FEE_TIER},
    serialization::u256_string_serialization,
};

/// The ABI shapes of the quote request and response
#[allow(missing_docs, clippy::missing_docs_in_private_items)]
mod abi {
    use super::sol;

    sol! {
        struct QuoteRequestAbi {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
        }

        struct HintedQuoteRequestAbi {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            bytes32 poolHint;
        }

        struct QuoteResponseAbi {
            uint256 amountOut;
            uint256 liquidity;
            uint32 feeTier;
            uint8 version;
            address hook;
            address[] path;
            bytes routeData;
        }
    }
}

use abi::{HintedQuoteRequestAbi, QuoteResponseAbi, QuoteRequestAbi};

// -------------
// | Api Types |
// -------------

/// A request for the best route between two tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// The token being sold
    pub token_in: Address,
    /// The token being bought
    pub token_out: Address,
    /// The amount of the token being sold, in atoms
    #[serde(with = "u256_string_serialization")]
    pub amount_in: U256,
    /// A specific pool to quote against, bypassing aggregation
    #[serde(default)]
    pub pool_hint: Option<B256>,
}

impl QuoteRequest {
    /// Create a plain quote request
    pub fn new(token_in: Address, token_out: Address, amount_in: U256) -> Self {
        Self { token_in, token_out, amount_in, pool_hint: None }
    }

    /// Restrict the quote to the given pool
    pub fn with_pool_hint(mut self, pool_id: B256) -> Self {
        self.pool_hint = Some(pool_id);
        self
    }

    /// ABI-encode the request as an ordered parameter sequence
    pub fn abi_encode(&self) -> Bytes {
        let Self { token_in, token_out, amount_in, pool_hint } = self.clone();
        let encoded = match pool_hint {
            Some(pool_hint) => HintedQuoteRequestAbi {
                tokenIn: token_in,
                tokenOut: token_out,
                amountIn: amount_in,
                poolHint: pool_hint,
            }
            .abi_encode_params(),
            None => QuoteRequestAbi { tokenIn: token_in, tokenOut: token_out, amountIn: amount_in }
                .abi_encode_params(),
        };

        Bytes::from(encoded)
    }

    /// Decode a request, accepting both the plain and the hinted form
    pub fn abi_decode(data: &[u8]) -> Result<Self, ApiError> {
        // The hinted form is exactly one static word longer
        if let Ok(hinted) = <HintedQuoteRequestAbi as SolType>::abi_decode_params(data) {
            return Ok(Self {
                token_in: hinted.tokenIn,
                token_out: hinted.tokenOut,
                amount_in: hinted.amountIn,
                pool_hint: Some(hinted.poolHint),
            });
        }

        let plain = <QuoteRequestAbi as SolType>::abi_decode_params(data)?;
        Ok(Self::new(plain.tokenIn, plain.tokenOut, plain.amountIn))
    }
}

/// The response to a quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResponse {
    /// The amount of the token being bought, in atoms
    #[serde(with = "u256_string_serialization")]
    pub amount_out: U256,
    /// The output-side depth of the pool that priced the route
    #[serde(with = "u256_string_serialization")]
    pub liquidity: U256,
    /// The fee tier, `NO_FEE_TIER` unless the route is fee-tiered
    pub fee_tier: u32,
    /// The generation tag, `NO_ROUTE_TAG` when no route exists
    pub version: u8,
    /// The hook contract of the pool, or the zero address
    pub hook: Address,
    /// The intermediate tokens of a multi-hop route
    pub path: Vec<Address>,
    /// The encoded route data, understood only by the matching adapter
    pub route_data: Bytes,
}

impl QuoteResponse {
    /// The response emitted when no adapter produced a usable route
    pub fn no_route() -> Self {
        Self {
            amount_out: U256::ZERO,
            liquidity: U256::ZERO,
            fee_tier: NO_FEE_TIER,
            version: NO_ROUTE_TAG,
            hook: Address::ZERO,
            path: Vec::new(),
            route_data: Bytes::new(),
        }
    }

    /// Whether the response denotes the absence of a route
    ///
    /// Callers must not attempt execution against such a response
    pub fn is_no_route(&self) -> bool {
        self.version == NO_ROUTE_TAG
    }

    /// The generation of the route, `None` for the no-route sentinel
    pub fn generation(&self) -> Result<Option<AmmGeneration>, ApiError> {
        AmmGeneration::from_tag(self.version)
    }

    /// Rebuild the route this response describes
    pub fn to_route(
        &self,
        token_in: Address,
        token_out: Address,
    ) -> Result<Option<SwapRoute>, ApiError> {
        let Some(generation) = self.generation()? else {
            return Ok(None);
        };

        let hook_data = if self.hook == Address::ZERO {
            Bytes::new()
        } else {
            Bytes::copy_from_slice(self.hook.as_slice())
        };

        Ok(Some(SwapRoute {
            token_in,
            token_out,
            generation,
            fee_tier: self.fee_tier,
            path: self.path.clone(),
            route_data: self.route_data.clone(),
            hook_data,
        }))
    }

    /// ABI-encode the response as an ordered parameter sequence
    pub fn abi_encode(&self) -> Bytes {
        let encoded = QuoteResponseAbi {
            amountOut: self.amount_out,
            liquidity: self.liquidity,
            feeTier: self.fee_tier,
            version: self.version,
            hook: self.hook,
            path: self.path.clone(),
            routeData: self.route_data.clone(),
        }
        .abi_encode_params();

        Bytes::from(encoded)
    }

    /// Decode an ABI-encoded response
    pub fn abi_decode(data: &[u8]) -> Result<Self, ApiError> {
        let decoded = <QuoteResponseAbi as SolType>::abi_decode_params(data)?;
        // Reject unknown tags early
        AmmGeneration::from_tag(decoded.version)?;

        Ok(Self {
            amount_out: decoded.amountOut,
            liquidity: decoded.liquidity,
            fee_tier: decoded.feeTier,
            version: decoded.version,
            hook: decoded.hook,
            path: decoded.path,
            route_data: decoded.routeData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The extended form carries the pool hint through encoding
    #[test]
    fn test_hinted_request_decoding() {
        let hint = B256::repeat_byte(0xab);
        let request =
            QuoteRequest::new(Address::ZERO, Address::repeat_byte(0x01), U256::from(100u64))
                .with_pool_hint(hint);

        let decoded = QuoteRequest::abi_decode(&request.abi_encode()).unwrap();
        assert_eq!(decoded.pool_hint, Some(hint));

        let plain = QuoteRequest::new(Address::ZERO, Address::repeat_byte(0x01), U256::from(1u64));
        let decoded = QuoteRequest::abi_decode(&plain.abi_encode()).unwrap();
        assert_eq!(decoded.pool_hint, None);
    }

    /// The no-route sentinel survives the wire and yields no route
    #[test]
    fn test_no_route_sentinel() {
        let response = QuoteResponse::abi_decode(&QuoteResponse::no_route().abi_encode()).unwrap();
        assert!(response.is_no_route());
        assert_eq!(response.to_route(Address::ZERO, Address::repeat_byte(0x01)).unwrap(), None);
    }

    /// An unknown generation tag is rejected at decode time
    #[test]
    fn test_unknown_version_rejected() {
        let mut response = QuoteResponse::no_route();
        response.version = 9;
        let res = QuoteResponse::abi_decode(&response.abi_encode());
        assert_eq!(res, Err(ApiError::UnknownGeneration(9)));
    }
}
