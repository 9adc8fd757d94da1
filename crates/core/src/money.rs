use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Signed amount in the statement currency, kept at minor-unit (cent) precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    /// Rounds half away from zero, the way spreadsheets show amounts.
    pub fn from_decimal(decimal: Decimal) -> Self {
        let rounded = decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        // A zero produced by subtraction or negation may carry a sign bit.
        if rounded.is_zero() {
            Money(Decimal::new(0, 2))
        } else {
            Money(rounded)
        }
    }

    pub fn zero() -> Self {
        Money(Decimal::new(0, 2))
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }
}

/// Always two fractional digits, no currency symbol: `-42.50`, `150.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money::from_decimal(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money::from_decimal(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money::from_decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn display_keeps_two_decimals() {
        assert_eq!(Money::from_cents(15000).to_string(), "150.00");
        assert_eq!(Money::from_cents(-4250).to_string(), "-42.50");
        assert_eq!(Money::from_cents(1).to_string(), "0.01");
    }

    #[test]
    fn from_decimal_rounds_to_cents() {
        let m = Money::from_decimal(Decimal::from_str("12.345").unwrap());
        assert_eq!(m.to_string(), "12.35");
        let m = Money::from_decimal(Decimal::from_str("12.355").unwrap());
        assert_eq!(m.to_string(), "12.36");
    }

    #[test]
    fn half_cent_rounds_away_from_zero() {
        let m = Money::from_decimal(Decimal::from_str("-0.005").unwrap());
        assert_eq!(m.to_string(), "-0.01");
        assert!(m.is_negative());
        let tiny = Money::from_decimal(Decimal::from_str("-0.004").unwrap());
        assert!(tiny.is_zero());
        assert_eq!(tiny.to_string(), "0.00");
    }

    #[test]
    fn subtraction_to_zero_is_not_negative() {
        let z = Money::zero() - Money::zero();
        assert!(z.is_zero());
        assert!(!z.is_negative());
        assert_eq!(z.to_string(), "0.00");
        assert_eq!((-Money::zero()).to_string(), "0.00");
    }

    #[test]
    fn inflow_minus_outflow() {
        let outflow = Money::from_cents(0) - Money::from_cents(2999);
        assert!(outflow.is_negative());
        assert_eq!(outflow, Money::from_cents(-2999));
    }
}
