//! Constant-product pricing math shared by the adapters

use alloy_primitives::U256;

use super::AdapterError;

// -------------
// | Constants |
// -------------

/// The denominator of pool fees, which are denominated in hundredths of a
/// basis point
pub const FEE_PIPS_DENOMINATOR: u32 = 1_000_000;

/// The denominator of pool fees, as a `U256`
const FEE_PIPS_DENOMINATOR_U256: U256 = U256::from_limbs([FEE_PIPS_DENOMINATOR as u64, 0, 0, 0]);

// ---------
// | Maths |
// ---------

/// The output of a constant-product swap of `amount_in` against the given
/// reserves, after charging `fee_pips` on the input
///
/// Rounds down. Errors if the pool is empty, or with `DustAmount` if the
/// output rounds to zero.
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_pips: u32,
) -> Result<U256, AdapterError> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(AdapterError::InsufficientLiquidity);
    }
    if fee_pips >= FEE_PIPS_DENOMINATOR {
        return Err(AdapterError::custom(format!("fee of {fee_pips} pips leaves no input")));
    }

    let fee_complement = U256::from(FEE_PIPS_DENOMINATOR - fee_pips);
    let amount_in_with_fee = amount_in.checked_mul(fee_complement).ok_or(AdapterError::Overflow)?;
    let numerator = amount_in_with_fee.checked_mul(reserve_out).ok_or(AdapterError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(FEE_PIPS_DENOMINATOR_U256)
        .and_then(|r| r.checked_add(amount_in_with_fee))
        .ok_or(AdapterError::Overflow)?;

    let amount_out = numerator / denominator;
    if amount_out.is_zero() {
        return Err(AdapterError::DustAmount);
    }

    Ok(amount_out)
}

/// Split `amount` into `(net, fee)` for a fee of `fee_bps` basis points,
/// rounding the fee down
pub fn take_bps(amount: U256, fee_bps: u64) -> Result<(U256, U256), AdapterError> {
    let fee = amount
        .checked_mul(U256::from(fee_bps))
        .ok_or(AdapterError::Overflow)?
        / U256::from(aggregator_api::BPS_DENOMINATOR);
    let net = amount.checked_sub(fee).ok_or(AdapterError::Overflow)?;
    Ok((net, fee))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A well-known constant-product quote: 1 unit into a 100/100 pool at 30bps
    #[test]
    fn test_amount_out_matches_reference() {
        let one = U256::from(10u64).pow(U256::from(18u64));
        let reserve = one * U256::from(100u64);

        let out = get_amount_out(one, reserve, reserve, 3000).unwrap();
        // 0.997 * 100 / 100.997
        assert_eq!(out, U256::from(987_158_034_397_061_298u64));
    }

    /// Larger trades get strictly worse prices
    #[test]
    fn test_price_impact() {
        let reserve = U256::from(1_000_000u64);
        let small = get_amount_out(U256::from(1_000u64), reserve, reserve, 3000).unwrap();
        let large = get_amount_out(U256::from(100_000u64), reserve, reserve, 3000).unwrap();

        assert!(large < small * U256::from(100u64));
    }

    /// Empty pools and dust outputs are unusable
    #[test]
    fn test_unusable_pools() {
        let res = get_amount_out(U256::from(1u64), U256::ZERO, U256::from(1u64), 3000);
        assert_eq!(res, Err(AdapterError::InsufficientLiquidity));

        let res =
            get_amount_out(U256::from(1u64), U256::from(1_000_000u64), U256::from(1u64), 3000);
        assert_eq!(res, Err(AdapterError::DustAmount));
    }

    /// Basis point fees round down
    #[test]
    fn test_take_bps() {
        let (net, fee) = take_bps(U256::from(19_999u64), 10).unwrap();
        assert_eq!(fee, U256::from(19u64));
        assert_eq!(net, U256::from(19_980u64));
    }
}
