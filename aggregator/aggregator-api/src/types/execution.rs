//! API types for swap execution

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolType, SolValue};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    generation::AmmGeneration,
    payload::VersionPayload,
    route::SwapRoute,
    serialization::u256_string_serialization,
};

/// The ABI shapes of the execution request
#[allow(missing_docs, clippy::missing_docs_in_private_items)]
mod abi {
    use super::sol;

    sol! {
        struct ExecutionRequestAbi {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint256 slippageBps;
            bytes refData;
            uint8 version;
            bytes payload;
            address recipient;
        }

        struct RefDataAbi {
            address refAddress;
            uint256 refFeeBps;
        }
    }
}

use abi::{ExecutionRequestAbi, RefDataAbi};

/// The referral data of an execution request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefData {
    /// The account credited with the referral fee
    pub ref_address: Address,
    /// The referral fee, in basis points of the output
    pub ref_fee_bps: u64,
}

impl RefData {
    /// Encode optional referral data; `None` encodes as the empty blob
    pub fn encode(ref_data: Option<&RefData>) -> Bytes {
        match ref_data {
            None => Bytes::new(),
            Some(data) => Bytes::from(
                RefDataAbi { refAddress: data.ref_address, refFeeBps: U256::from(data.ref_fee_bps) }
                    .abi_encode_params(),
            ),
        }
    }

    /// Decode referral data; the empty blob means "no referral"
    pub fn decode(data: &[u8]) -> Result<Option<RefData>, ApiError> {
        if data.is_empty() {
            return Ok(None);
        }

        let decoded = <RefDataAbi as SolType>::abi_decode_params(data)
            .map_err(ApiError::malformed_ref_data)?;
        let ref_fee_bps: u64 = decoded
            .refFeeBps
            .try_into()
            .map_err(|_| ApiError::malformed_ref_data("referral fee overflows u64"))?;

        Ok(Some(RefData { ref_address: decoded.refAddress, ref_fee_bps }))
    }
}

/// A request to execute a swap along a previously quoted route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The token being sold
    pub token_in: Address,
    /// The token being bought
    pub token_out: Address,
    /// The amount of the token being sold, in atoms
    #[serde(with = "u256_string_serialization")]
    pub amount_in: U256,
    /// The slippage tolerance, in basis points
    pub slippage_bps: u64,
    /// The referral data, if any
    #[serde(default)]
    pub ref_data: Option<RefData>,
    /// The generation tag, copied verbatim from the quote response
    pub version: u8,
    /// The version-specific payload, ABI-encoded
    pub payload: Bytes,
    /// The account receiving the bought tokens
    pub recipient: Address,
}

impl ExecutionRequest {
    /// Build an execution request for the given route
    ///
    /// A `None` route produces a request carrying the no-route tag, which the
    /// engine rejects before attempting any execution
    pub fn for_route(
        route: Option<&SwapRoute>,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        slippage_bps: u64,
        ref_data: Option<RefData>,
        recipient: Address,
    ) -> Self {
        let (version, payload) = match route {
            Some(route) => (route.generation.tag(), route.execution_payload().encode()),
            None => (crate::generation::NO_ROUTE_TAG, Bytes::new()),
        };

        Self { token_in, token_out, amount_in, slippage_bps, ref_data, version, payload, recipient }
    }

    /// Rebuild the route named by the request, `None` for the no-route tag
    pub fn route(&self) -> Result<Option<SwapRoute>, ApiError> {
        let Some(generation) = AmmGeneration::from_tag(self.version)? else {
            return Ok(None);
        };

        let payload = VersionPayload::decode(generation, &self.payload)?;
        SwapRoute::from_execution_payload(self.token_in, self.token_out, generation, payload)
            .map(Some)
    }

    /// ABI-encode the request as an ordered parameter sequence
    pub fn abi_encode(&self) -> Bytes {
        let encoded = ExecutionRequestAbi {
            tokenIn: self.token_in,
            tokenOut: self.token_out,
            amountIn: self.amount_in,
            slippageBps: U256::from(self.slippage_bps),
            refData: RefData::encode(self.ref_data.as_ref()),
            version: self.version,
            payload: self.payload.clone(),
            recipient: self.recipient,
        }
        .abi_encode_params();

        Bytes::from(encoded)
    }

    /// Decode an ABI-encoded request
    pub fn abi_decode(data: &[u8]) -> Result<Self, ApiError> {
        let decoded = <ExecutionRequestAbi as SolType>::abi_decode_params(data)?;
        let slippage_bps: u64 = decoded
            .slippageBps
            .try_into()
            .map_err(|_| ApiError::out_of_range("slippage overflows u64"))?;

        Ok(Self {
            token_in: decoded.tokenIn,
            token_out: decoded.tokenOut,
            amount_in: decoded.amountIn,
            slippage_bps,
            ref_data: RefData::decode(&decoded.refData)?,
            version: decoded.version,
            payload: decoded.payload,
            recipient: decoded.recipient,
        })
    }
}
