//! Validation of a caller-supplied quote against a fresh quote

use std::fmt::Display;

use aggregator_api::BPS_DENOMINATOR;
use alloy_primitives::U256;
use tracing::warn;

use crate::{error::SwapError, telemetry::record_quote_deviation};

/// Why a quote was judged stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The fresh quote found no route at all
    LiquidityVanished,
    /// The fresh output deviates from the caller's beyond the threshold
    DeviationExceeded {
        /// The measured deviation, in basis points
        deviation_bps: u64,
        /// The permitted deviation, in basis points
        threshold_bps: u64,
    },
    /// The caller's quote promised no output, so no deviation is defined
    ZeroExpectedOutput,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::LiquidityVanished => write!(f, "liquidity vanished"),
            RejectReason::DeviationExceeded { deviation_bps, threshold_bps } => {
                write!(f, "quote deviates {deviation_bps} bps, more than {threshold_bps} bps")
            },
            RejectReason::ZeroExpectedOutput => write!(f, "quote expects zero output"),
        }
    }
}

impl From<RejectReason> for SwapError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::LiquidityVanished => SwapError::NoRouteFound,
            other => SwapError::stale_quote(other),
        }
    }
}

/// The verdict of a freshness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessOutcome {
    /// The quote is fresh enough to execute against
    Accept {
        /// The measured deviation, in basis points
        deviation_bps: u64,
    },
    /// The quote is stale
    Reject(RejectReason),
}

impl FreshnessOutcome {
    /// Convert the verdict into a result
    pub fn into_result(self) -> Result<u64, SwapError> {
        match self {
            FreshnessOutcome::Accept { deviation_bps } => Ok(deviation_bps),
            FreshnessOutcome::Reject(reason) => Err(reason.into()),
        }
    }
}

/// Compares a caller-supplied quote against a fresh one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteFreshnessValidator {
    /// The greatest permitted deviation, in basis points
    threshold_bps: u64,
}

impl QuoteFreshnessValidator {
    /// Constructor
    pub fn new(threshold_bps: u64) -> Self {
        Self { threshold_bps }
    }

    /// Validate a stale output against a fresh one, `None` when the fresh
    /// quote found no route
    pub fn validate(&self, stale: U256, fresh: Option<U256>) -> FreshnessOutcome {
        let Some(fresh) = fresh else {
            warn!("Fresh quote found no route");
            return FreshnessOutcome::Reject(RejectReason::LiquidityVanished);
        };
        if stale.is_zero() {
            return FreshnessOutcome::Reject(RejectReason::ZeroExpectedOutput);
        }

        let deviation_bps = deviation_bps(stale, fresh);
        let accepted = deviation_bps <= self.threshold_bps;
        record_quote_deviation(deviation_bps, accepted);

        if !accepted {
            warn!(
                %stale,
                %fresh,
                deviation_bps,
                threshold_bps = self.threshold_bps,
                "Quote deviates too far from a fresh quote"
            );
            return FreshnessOutcome::Reject(RejectReason::DeviationExceeded {
                deviation_bps,
                threshold_bps: self.threshold_bps,
            });
        }

        FreshnessOutcome::Accept { deviation_bps }
    }
}

/// The relative deviation of `fresh` from `stale`, in basis points, rounded
/// up and saturating at `u64::MAX`
///
/// Deviation in either direction counts; `stale` must be non-zero
pub fn deviation_bps(stale: U256, fresh: U256) -> u64 {
    let diff = if stale > fresh { stale - fresh } else { fresh - stale };
    let Some(scaled) = diff.checked_mul(U256::from(BPS_DENOMINATOR)) else {
        return u64::MAX;
    };

    let rounding = if (scaled % stale).is_zero() { U256::ZERO } else { U256::from(1u64) };
    let bps = scaled / stale + rounding;
    u64::try_from(bps).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Any excess over the threshold rejects, thanks to rounding up
    #[test]
    fn test_deviation_rounds_up() {
        let stale = U256::from(1_000_000u64);
        // 1.0001% below
        let fresh = U256::from(989_999u64);

        assert_eq!(deviation_bps(stale, fresh), 101);
        let validator = QuoteFreshnessValidator::new(100);
        let outcome = validator.validate(stale, Some(fresh));
        assert_eq!(
            outcome,
            FreshnessOutcome::Reject(RejectReason::DeviationExceeded {
                deviation_bps: 101,
                threshold_bps: 100
            })
        );
    }

    /// Exactly the threshold is accepted
    #[test]
    fn test_deviation_at_threshold() {
        let validator = QuoteFreshnessValidator::new(100);
        let outcome = validator.validate(U256::from(10_000u64), Some(U256::from(9_900u64)));
        assert_eq!(outcome, FreshnessOutcome::Accept { deviation_bps: 100 });
    }

    /// Improvements count as deviation too
    #[test]
    fn test_upward_deviation() {
        let validator = QuoteFreshnessValidator::new(100);
        let outcome = validator.validate(U256::from(10_000u64), Some(U256::from(10_200u64)));
        let expected = RejectReason::DeviationExceeded { deviation_bps: 200, threshold_bps: 100 };
        assert_eq!(outcome, FreshnessOutcome::Reject(expected));
    }

    /// A vanished route maps to no route; other rejections map to a stale quote
    #[test]
    fn test_reject_reasons() {
        let validator = QuoteFreshnessValidator::new(100);

        let vanished = validator.validate(U256::from(1u64), None).into_result();
        assert_eq!(vanished, Err(SwapError::NoRouteFound));

        let zero = validator.validate(U256::ZERO, Some(U256::from(1u64))).into_result();
        assert!(matches!(zero, Err(SwapError::StaleQuote(_))));
    }
}
