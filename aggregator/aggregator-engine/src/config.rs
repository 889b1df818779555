//! Engine and platform configuration

use std::{fmt::Display, path::Path, str::FromStr};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    error::SwapError,
    fees::MAX_PLATFORM_FEE_BPS,
    venues::{amm_math::FEE_PIPS_DENOMINATOR, fee_tiered::DEFAULT_FEE_TIERS},
};

// -------------
// | Constants |
// -------------

/// The default freshness threshold, in basis points
pub const DEFAULT_MAX_QUOTE_DEVIATION_BPS: u64 = 100;
/// The default bound on chained fee conversion swaps
pub const DEFAULT_MAX_FEE_CONVERSION_DEPTH: u8 = 1;
/// The greatest fee conversion depth a config may request
const MAX_FEE_CONVERSION_DEPTH: u8 = 4;

// ---------
// | Types |
// ---------

/// The policy used to pick one route among the adapters' quotes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePolicy {
    /// The greatest output
    #[default]
    BestPrice,
    /// The lowest estimated gas
    Fastest,
    /// The deepest output-side liquidity
    Safest,
}

impl Display for RoutePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutePolicy::BestPrice => write!(f, "best_price"),
            RoutePolicy::Fastest => write!(f, "fastest"),
            RoutePolicy::Safest => write!(f, "safest"),
        }
    }
}

impl FromStr for RoutePolicy {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "best_price" => Ok(RoutePolicy::BestPrice),
            "fastest" => Ok(RoutePolicy::Fastest),
            "safest" => Ok(RoutePolicy::Safest),
            other => Err(SwapError::config(format!("unknown route policy: {other}"))),
        }
    }
}

/// The administrator-controlled configuration read by every swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Whether exact output ties are broken by the lower gas estimate
    #[serde(default)]
    pub gas_optimization: bool,
    /// Whether every execution is revalidated against a fresh quote, even in
    /// trust mode
    #[serde(default)]
    pub mev_protection: bool,
    /// The route selection policy
    #[serde(default)]
    pub route_policy: RoutePolicy,
    /// The platform fee, in basis points of the raw output
    #[serde(default)]
    pub platform_fee_bps: u64,
    /// The account receiving platform fees
    #[serde(default)]
    pub fee_recipient: Address,
    /// The greatest deviation between a caller's quote and a fresh quote
    #[serde(default = "default_max_quote_deviation_bps")]
    pub max_quote_deviation_bps: u64,
    /// The most swaps a fee conversion may chain to reach the native asset
    #[serde(default = "default_max_fee_conversion_depth")]
    pub max_fee_conversion_depth: u8,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            gas_optimization: false,
            mev_protection: false,
            route_policy: RoutePolicy::default(),
            platform_fee_bps: 0,
            fee_recipient: Address::ZERO,
            max_quote_deviation_bps: DEFAULT_MAX_QUOTE_DEVIATION_BPS,
            max_fee_conversion_depth: DEFAULT_MAX_FEE_CONVERSION_DEPTH,
        }
    }
}

impl PlatformConfig {
    /// Validate the config
    pub fn validate(&self) -> Result<(), SwapError> {
        if self.platform_fee_bps > MAX_PLATFORM_FEE_BPS {
            return Err(SwapError::fee_rate_exceeded(format!(
                "platform fee of {} bps exceeds {MAX_PLATFORM_FEE_BPS} bps",
                self.platform_fee_bps
            )));
        }

        if self.platform_fee_bps > 0 && self.fee_recipient == Address::ZERO {
            return Err(SwapError::config("a platform fee requires a fee recipient"));
        }

        if self.max_quote_deviation_bps > aggregator_api::BPS_DENOMINATOR {
            return Err(SwapError::config("quote deviation threshold exceeds 100%"));
        }

        if self.max_fee_conversion_depth > MAX_FEE_CONVERSION_DEPTH {
            return Err(SwapError::config(format!(
                "fee conversion depth may not exceed {MAX_FEE_CONVERSION_DEPTH}"
            )));
        }

        Ok(())
    }
}

/// Configuration of the direct pair adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectPairConfig {
    /// Whether the adapter is registered
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// The tokens a multi-hop route may pass through
    #[serde(default)]
    pub intermediate_tokens: Vec<Address>,
}

impl Default for DirectPairConfig {
    fn default() -> Self {
        Self { enabled: true, intermediate_tokens: Vec::new() }
    }
}

/// Configuration of the fee-tiered adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTieredConfig {
    /// Whether the adapter is registered
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// The fee tiers searched, in hundredths of a basis point
    #[serde(default = "default_fee_tiers")]
    pub fee_tiers: Vec<u32>,
}

impl Default for FeeTieredConfig {
    fn default() -> Self {
        Self { enabled: true, fee_tiers: default_fee_tiers() }
    }
}

/// Configuration of the hook-enabled adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookEnabledConfig {
    /// Whether the adapter is registered
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HookEnabledConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// The adapters registered with the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// The direct pair adapter
    #[serde(default)]
    pub direct_pair: DirectPairConfig,
    /// The fee-tiered adapter
    #[serde(default)]
    pub fee_tiered: FeeTieredConfig,
    /// The hook-enabled adapter
    #[serde(default)]
    pub hook_enabled: HookEnabledConfig,
}

impl AdapterConfig {
    /// Validate the config
    pub fn validate(&self) -> Result<(), SwapError> {
        if !(self.direct_pair.enabled || self.fee_tiered.enabled || self.hook_enabled.enabled) {
            return Err(SwapError::config("at least one adapter must be enabled"));
        }

        if self.fee_tiered.enabled {
            if self.fee_tiered.fee_tiers.is_empty() {
                return Err(SwapError::config("the fee tiered adapter needs a fee tier"));
            }
            if let Some(tier) =
                self.fee_tiered.fee_tiers.iter().find(|t| **t >= FEE_PIPS_DENOMINATOR)
            {
                return Err(SwapError::config(format!("fee tier {tier} is not below 100%")));
            }
        }

        Ok(())
    }
}

/// The full engine configuration, as read from a JSON file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The account the engine trades from
    pub engine_account: Address,
    /// The only account permitted to update the platform config
    pub admin: Address,
    /// The account input tokens are pulled through when a swap opts into
    /// delegated allowances
    #[serde(default)]
    pub delegated_allowance_account: Option<Address>,
    /// The registered adapters
    #[serde(default)]
    pub adapters: AdapterConfig,
    /// The initial platform config
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl EngineConfig {
    /// A config with default adapters and platform settings
    pub fn new(engine_account: Address, admin: Address) -> Self {
        Self {
            engine_account,
            admin,
            delegated_allowance_account: None,
            adapters: AdapterConfig::default(),
            platform: PlatformConfig::default(),
        }
    }

    /// Read a config from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, SwapError> {
        let contents = std::fs::read_to_string(path).map_err(SwapError::config)?;
        let config: Self = serde_json::from_str(&contents).map_err(SwapError::config)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), SwapError> {
        if self.engine_account == Address::ZERO {
            return Err(SwapError::config("the engine account may not be the zero address"));
        }
        if self.admin == Address::ZERO {
            return Err(SwapError::config("the admin may not be the zero address"));
        }

        self.adapters.validate()?;
        self.platform.validate()
    }
}

// -----------
// | Helpers |
// -----------

/// Serde default for enablement flags
fn default_true() -> bool {
    true
}

/// Serde default for the fee tiers
fn default_fee_tiers() -> Vec<u32> {
    DEFAULT_FEE_TIERS.to_vec()
}

/// Serde default for the freshness threshold
fn default_max_quote_deviation_bps() -> u64 {
    DEFAULT_MAX_QUOTE_DEVIATION_BPS
}

/// Serde default for the fee conversion depth
fn default_max_fee_conversion_depth() -> u8 {
    DEFAULT_MAX_FEE_CONVERSION_DEPTH
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal config fills in every default
    #[test]
    fn test_minimal_config() {
        let json = format!(
            r#"{{ "engine_account": "{}", "admin": "{}" }}"#,
            Address::repeat_byte(0x0e),
            Address::repeat_byte(0x0a),
        );
        let config: EngineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.platform, PlatformConfig::default());
        assert_eq!(config.adapters.fee_tiered.fee_tiers, DEFAULT_FEE_TIERS.to_vec());
        assert!(config.adapters.hook_enabled.enabled);
        config.validate().unwrap();
    }

    /// The platform fee ceiling is enforced at validation time
    #[test]
    fn test_platform_fee_ceiling() {
        let config = PlatformConfig {
            platform_fee_bps: MAX_PLATFORM_FEE_BPS + 1,
            fee_recipient: Address::repeat_byte(0x0f),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SwapError::FeeRateExceeded(_))));

        let config = PlatformConfig { platform_fee_bps: MAX_PLATFORM_FEE_BPS, ..config };
        config.validate().unwrap();
    }

    /// Route policies parse from their kebab or snake case names
    #[test]
    fn test_route_policy_parsing() {
        assert_eq!("best-price".parse::<RoutePolicy>().unwrap(), RoutePolicy::BestPrice);
        assert_eq!("Safest".parse::<RoutePolicy>().unwrap(), RoutePolicy::Safest);
        assert!("cheapest".parse::<RoutePolicy>().is_err());
    }
}
