//! Shared helpers for monetary arithmetic.

use rust_decimal::Decimal;

/// Rounds a monetary value to two decimal places, half-up (away from zero
/// at the midpoint), the convention used across the fiscal tables.
///
/// ```
/// use rust_decimal_macros::dec;
/// use medflow_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(46.8705)), dec!(46.87));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Clamps a withholding result to zero or above.
pub fn clamp_non_negative(value: Decimal) -> Decimal {
    if value > Decimal::ZERO { value } else { Decimal::ZERO }
}
