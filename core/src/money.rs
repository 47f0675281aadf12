//! Fixed-scale decimal arithmetic for money and percentages.
//!
//! Money values are truncated toward zero at two decimal places and
//! always carry at least two places, so `50` is reported as `50.00`.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub const MONEY_SCALE: u32 = 2;

const HUNDRED: Decimal = dec!(100);

/// Truncate to the money scale, padding shorter values to two places.
pub fn to_money_scale(value: Decimal) -> Decimal {
    let mut v = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
    if v.scale() < MONEY_SCALE {
        v.rescale(MONEY_SCALE);
    }
    v
}

/// `numerator / denominator` truncated to the money scale.
/// Callers guarantee a non-zero denominator.
pub fn div_money(numerator: Decimal, denominator: Decimal) -> Decimal {
    to_money_scale(numerator / denominator)
}

/// `round(100 × part / whole, 2)`, half away from zero.
/// `None` when `whole` is zero: a rate over an empty population is undefined.
pub fn percentage(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole.is_zero() {
        return None;
    }
    Some((HUNDRED * part / whole).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
