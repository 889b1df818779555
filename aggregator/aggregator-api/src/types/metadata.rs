//! Optional, caller-supplied metadata attached to a swap

use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::serialization::option_u256_string_serialization;

/// Informational metadata accompanying a swap
///
/// Routing and fee computation never depend on these fields. The nonce, when
/// present, is consumed once per integrator and payer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapMetadata {
    /// The identifier of the integrating frontend or partner
    #[serde(default)]
    pub integrator: String,
    /// Opaque user data, echoed back on the receipt
    #[serde(default)]
    pub user_data: Bytes,
    /// A replay-protection nonce
    #[serde(default, with = "option_u256_string_serialization")]
    pub nonce: Option<U256>,
    /// A signature authorizing a delegated approval
    #[serde(default)]
    pub signature: Option<Bytes>,
    /// Whether the input is pulled through the delegated allowance account
    /// rather than a direct approval to the engine
    #[serde(default)]
    pub use_delegated_allowance: bool,
    /// The aggregator version tag, for analytics
    #[serde(default)]
    pub aggregator_version: Option<String>,
}
