//! # Fixed-point Ratio Arithmetic
//!
//! Fractional accrual rates are carried as integers scaled by [`SCALE`].
//! Both directions truncate toward zero:
//!
//! ```text
//! scaled_ratio(n, d) = floor(n * SCALE / d)
//! apply_ratio(a, r)  = floor(a * r / SCALE)
//! mul_div(a, b, d)   = floor(a * b / d)      (256-bit intermediate)
//! ```
//!
//! Every rounding step in the pool goes through these helpers and always
//! rounds in the pool's favour, so the residue left behind is dust the
//! ledger keeps rather than value it owes.

use primitive_types::U256;

use crate::error::{PoolError, Result};

/// Fixed-point scale for cumulative ratios (10^9)
pub const SCALE: u128 = 1_000_000_000;

/// `floor(numerator * SCALE / denominator)`
///
/// Fails with [`PoolError::EmptyPool`] when `denominator` is zero.
pub fn scaled_ratio(numerator: u64, denominator: u64) -> Result<u128> {
    mul_div(numerator as u128, SCALE, denominator as u128)
}

/// `floor(amount * ratio_delta / SCALE)`
pub fn apply_ratio(amount: u64, ratio_delta: u128) -> Result<u64> {
    to_amount(mul_div(amount as u128, ratio_delta, SCALE)?)
}

/// `floor(a * b / denominator)` without intermediate overflow
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128> {
    mul_div_rounded(a, b, denominator, false)
}

/// `ceil(a * b / denominator)` without intermediate overflow
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> Result<u128> {
    mul_div_rounded(a, b, denominator, true)
}

fn mul_div_rounded(a: u128, b: u128, denominator: u128, round_up: bool) -> Result<u128> {
    if denominator == 0 {
        return Err(PoolError::EmptyPool);
    }
    // a, b < 2^128 so the product always fits in 256 bits
    let (quotient, remainder) = (U256::from(a) * U256::from(b)).div_mod(U256::from(denominator));
    let quotient = if round_up && !remainder.is_zero() {
        quotient + U256::one()
    } else {
        quotient
    };
    if quotient > U256::from(u128::MAX) {
        return Err(PoolError::ArithmeticOverflow);
    }
    Ok(quotient.as_u128())
}

/// Narrow a wide intermediate back to a token amount
pub fn to_amount(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| PoolError::ArithmeticOverflow)
}

/// Checked `a + b` on token amounts
pub fn add_amount(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b).ok_or(PoolError::ArithmeticOverflow)
}

/// Checked `a + b` on cumulative ratios and share counts
pub fn add_ratio(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(PoolError::ArithmeticOverflow)
}

/// Ratio accrued since `snapshot`.
///
/// Cumulative ratios never decrease, so a snapshot ahead of the ledger means
/// the position was not taken from this ledger.
pub fn ratio_delta(current: u128, snapshot: u128) -> Result<u128> {
    current
        .checked_sub(snapshot)
        .ok_or(PoolError::ArithmeticOverflow)
}
