//! Currency rounding.
//!
//! Every monetary value the engine produces passes through
//! [`round_currency`] after each arithmetic step.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for money.
pub const CURRENCY_DP: u32 = 2;

/// Rounds a monetary value to 2 decimal places, half away from zero.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::round_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round_currency(dec!(8333.3333)), dec!(8333.33));
/// assert_eq!(round_currency(dec!(366.665)), dec!(366.67));
/// assert_eq!(round_currency(dec!(-0.005)), dec!(-0.01));
/// ```
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Multiplies and rounds in one step.
pub fn mul_round(value: Decimal, factor: Decimal) -> Decimal {
    round_currency(value * factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rounds_half_away_from_zero() {
        assert_eq!(round_currency(dec!(0.125)), dec!(0.13));
        assert_eq!(round_currency(dec!(0.124)), dec!(0.12));
        assert_eq!(round_currency(dec!(-0.125)), dec!(-0.13));
    }

    #[test]
    fn test_keeps_values_with_two_places() {
        assert_eq!(round_currency(dec!(20000.00)), dec!(20000));
        assert_eq!(round_currency(dec!(962.00)), dec!(962));
    }

    #[test]
    fn test_mul_round_gratuity() {
        assert_eq!(mul_round(dec!(20000), dec!(0.0481)), dec!(962));
        assert_eq!(mul_round(dec!(3333.33), dec!(0.0481)), dec!(160.33));
    }
}
