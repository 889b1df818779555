//! Platform and referral fee computation
//!
//! Fees are always taken from the swap output, never the input. Both fees are
//! computed independently against the raw output and rounded down.

pub mod conversion;

use aggregator_api::{
    execution::RefData, serialization::u256_string_serialization, BPS_DENOMINATOR,
};
use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::error::SwapError;

// -------------
// | Constants |
// -------------

/// The greatest platform fee, in basis points
pub const MAX_PLATFORM_FEE_BPS: u64 = 1000;
/// The greatest referral fee, in basis points
pub const MAX_REF_FEE_BPS: u64 = 100;

/// The basis point denominator, as a `U256`
const BPS_DENOMINATOR_U256: U256 = U256::from_limbs([BPS_DENOMINATOR, 0, 0, 0]);

// ---------
// | Types |
// ---------

/// A referral configuration
///
/// Inert unless the referral account is non-null and the rate is non-zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefConfiguration {
    /// The account credited with the referral fee
    ref_address: Address,
    /// The referral fee, in basis points
    ref_fee_bps: u64,
}

impl RefConfiguration {
    /// Constructor, rejecting rates above the referral ceiling
    pub fn new(ref_address: Address, ref_fee_bps: u64) -> Result<Self, SwapError> {
        if ref_fee_bps > MAX_REF_FEE_BPS {
            return Err(SwapError::fee_rate_exceeded(format!(
                "referral fee of {ref_fee_bps} bps exceeds {MAX_REF_FEE_BPS} bps"
            )));
        }

        Ok(Self { ref_address, ref_fee_bps })
    }

    /// The configuration carrying no referral
    pub fn none() -> Self {
        Self::default()
    }

    /// Build the configuration carried by an execution request
    pub fn from_ref_data(ref_data: Option<&RefData>) -> Result<Self, SwapError> {
        match ref_data {
            Some(data) => Self::new(data.ref_address, data.ref_fee_bps),
            None => Ok(Self::none()),
        }
    }

    /// The referral account
    pub fn ref_address(&self) -> Address {
        self.ref_address
    }

    /// The referral rate, in basis points
    pub fn ref_fee_bps(&self) -> u64 {
        self.ref_fee_bps
    }

    /// Whether the referral earns a fee
    pub fn is_active(&self) -> bool {
        self.ref_address != Address::ZERO && self.ref_fee_bps > 0
    }
}

/// The fees taken from one swap's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeProcessing {
    /// The referral configuration the fees were computed under
    pub ref_config: RefConfiguration,
    /// The platform rate the fees were computed under
    pub platform_fee_bps: u64,
    /// The platform fee, in the output token
    #[serde(with = "u256_string_serialization")]
    pub platform_fee: U256,
    /// The referral fee, in the output token
    #[serde(with = "u256_string_serialization")]
    pub ref_fee: U256,
    /// Whether the fee is taken from the output; always true
    pub fee_on_output: bool,
}

impl FeeProcessing {
    /// The sum of both fees
    pub fn total_fee(&self) -> U256 {
        self.platform_fee + self.ref_fee
    }

    /// The same processing with both fees forgone
    pub fn waived(self) -> Self {
        Self { platform_fee: U256::ZERO, ref_fee: U256::ZERO, ..self }
    }

    /// The output left for the recipient after both fees
    pub fn net_output(&self, raw_output: U256) -> Result<U256, SwapError> {
        raw_output
            .checked_sub(self.total_fee())
            .ok_or_else(|| SwapError::fee_rate_exceeded("fees exceed the output"))
    }
}

// ------------------
// | Fee Processing |
// ------------------

/// Compute the platform and referral fees on a raw output
pub fn compute_fees(
    raw_output: U256,
    ref_config: &RefConfiguration,
    platform_fee_bps: u64,
) -> Result<FeeProcessing, SwapError> {
    if platform_fee_bps > MAX_PLATFORM_FEE_BPS {
        return Err(SwapError::fee_rate_exceeded(format!(
            "platform fee of {platform_fee_bps} bps exceeds {MAX_PLATFORM_FEE_BPS} bps"
        )));
    }
    if ref_config.ref_fee_bps > MAX_REF_FEE_BPS {
        return Err(SwapError::fee_rate_exceeded(format!(
            "referral fee of {} bps exceeds {MAX_REF_FEE_BPS} bps",
            ref_config.ref_fee_bps
        )));
    }

    let platform_fee = apply_bps(raw_output, platform_fee_bps)?;
    let ref_fee = if ref_config.is_active() {
        apply_bps(raw_output, ref_config.ref_fee_bps)?
    } else {
        U256::ZERO
    };

    let fees = FeeProcessing {
        ref_config: *ref_config,
        platform_fee_bps,
        platform_fee,
        ref_fee,
        fee_on_output: true,
    };

    // Fees never exceed the raw output
    fees.net_output(raw_output)?;
    Ok(fees)
}

/// `amount * bps / 10000`, rounded down
fn apply_bps(amount: U256, bps: u64) -> Result<U256, SwapError> {
    let scaled = amount
        .checked_mul(U256::from(bps))
        .ok_or_else(|| SwapError::fee_rate_exceeded("fee computation overflows"))?;
    Ok(scaled / BPS_DENOMINATOR_U256)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 10bps platform fee and a 50bps referral on a round output
    #[test]
    fn test_fee_amounts() {
        let referrer = Address::repeat_byte(0x0f);
        let ref_config = RefConfiguration::new(referrer, 50).unwrap();

        let fees = compute_fees(U256::from(1_000_000u64), &ref_config, 10).unwrap();
        assert_eq!(fees.platform_fee, U256::from(1_000u64));
        assert_eq!(fees.ref_fee, U256::from(5_000u64));
        assert!(fees.fee_on_output);
        assert_eq!(fees.net_output(U256::from(1_000_000u64)).unwrap(), U256::from(994_000u64));
    }

    /// A null referral account earns nothing, whatever its rate
    #[test]
    fn test_null_referral_inert() {
        let ref_config = RefConfiguration::new(Address::ZERO, 50).unwrap();
        assert!(!ref_config.is_active());

        let fees = compute_fees(U256::from(1_000_000u64), &ref_config, 10).unwrap();
        assert_eq!(fees.ref_fee, U256::ZERO);
        assert_eq!(fees.platform_fee, U256::from(1_000u64));
    }

    /// Fees round down, so dust outputs pay nothing
    #[test]
    fn test_fees_round_down() {
        let ref_config = RefConfiguration::new(Address::repeat_byte(0x0f), 100).unwrap();
        let fees = compute_fees(U256::from(99u64), &ref_config, 1000).unwrap();

        assert_eq!(fees.platform_fee, U256::from(9u64));
        assert_eq!(fees.ref_fee, U256::ZERO);
    }

    /// Rates above their ceilings are rejected
    #[test]
    fn test_fee_ceilings() {
        let err = RefConfiguration::new(Address::repeat_byte(0x0f), MAX_REF_FEE_BPS + 1);
        assert!(matches!(err, Err(SwapError::FeeRateExceeded(_))));

        let none = RefConfiguration::none();
        let res = compute_fees(U256::from(1u64), &none, MAX_PLATFORM_FEE_BPS + 1);
        assert!(matches!(res, Err(SwapError::FeeRateExceeded(_))));

        // At the ceilings, fees never exceed the output
        let ref_config =
            RefConfiguration::new(Address::repeat_byte(0x0f), MAX_REF_FEE_BPS).unwrap();
        let raw = U256::from(123_456_789u64);
        let fees = compute_fees(raw, &ref_config, MAX_PLATFORM_FEE_BPS).unwrap();
        assert!(fees.total_fee() <= raw);
    }

    /// Referral data decodes to a configuration, or to none
    #[test]
    fn test_from_ref_data() {
        let data = RefData { ref_address: Address::repeat_byte(0x0f), ref_fee_bps: 25 };
        let ref_config = RefConfiguration::from_ref_data(Some(&data)).unwrap();
        assert_eq!(ref_config.ref_fee_bps(), 25);

        assert_eq!(RefConfiguration::from_ref_data(None).unwrap(), RefConfiguration::none());

        let data = RefData { ref_fee_bps: 101, ..data };
        assert!(RefConfiguration::from_ref_data(Some(&data)).is_err());
    }
}
