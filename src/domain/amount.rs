//! Token amounts backed by rust_decimal.
//!
//! Amounts are never negative. Arithmetic is checked: subtraction that would go
//! below zero and overflowing operations return `None` so callers can turn them
//! into protocol errors instead of panicking.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lossless, non-negative token amount.
///
/// Serializes to a JSON string so no precision is lost in transit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "AmountRepr", into = "AmountRepr")]
pub struct Amount(Decimal);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),
    #[error("invalid amount: {0}")]
    Parse(String),
}

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Wrap a decimal, rejecting negative values.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }
        Ok(Amount(value))
    }

    /// Parse an amount from its decimal string form.
    pub fn from_str_canonical(s: &str) -> Result<Self, AmountError> {
        let value = Decimal::from_str(s.trim()).map_err(|e| AmountError::Parse(e.to_string()))?;
        Self::new(value)
    }

    /// Canonical string form (trailing zeros removed, no exponent).
    pub fn to_canonical_string(&self) -> String {
        self.0.normalize().to_string()
    }

    pub fn inner(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// `None` when the result would be negative.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        if rhs.0 > self.0 {
            return None;
        }
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        self.checked_sub(rhs).unwrap_or(Amount::ZERO)
    }

    /// Scale by a non-negative factor (prices, rates, loan-to-value).
    pub fn checked_mul(self, factor: Decimal) -> Option<Amount> {
        if factor < Decimal::ZERO {
            return None;
        }
        self.0.checked_mul(factor).map(Amount)
    }

    pub fn checked_div(self, divisor: Decimal) -> Option<Amount> {
        if divisor <= Decimal::ZERO {
            return None;
        }
        self.0.checked_div(divisor).map(Amount)
    }

    /// Scale by `(10_000 - bps) / 10_000`, the usual slippage haircut.
    pub fn less_bps(self, bps: u32) -> Option<Amount> {
        if bps > 10_000 {
            return None;
        }
        let keep = Decimal::from(10_000 - bps) / Decimal::from(10_000);
        self.checked_mul(keep)
    }

    /// Scale by `(10_000 + bps) / 10_000`.
    pub fn plus_bps(self, bps: u32) -> Option<Amount> {
        let grow = Decimal::from(10_000u64 + u64::from(bps)) / Decimal::from(10_000);
        self.checked_mul(grow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(Decimal::from(value))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

#[derive(Serialize, Deserialize)]
struct AmountRepr(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl TryFrom<AmountRepr> for Amount {
    type Error = AmountError;

    fn try_from(repr: AmountRepr) -> Result<Self, Self::Error> {
        Amount::new(repr.0)
    }
}

impl From<Amount> for AmountRepr {
    fn from(amount: Amount) -> Self {
        AmountRepr(amount.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(s: &str) -> Amount {
        Amount::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_rejects_negative() {
        assert!(matches!(
            Amount::from_str_canonical("-1"),
            Err(AmountError::Negative(_))
        ));
        assert!(matches!(
            Amount::from_str_canonical("abc"),
            Err(AmountError::Parse(_))
        ));
    }

    #[test]
    fn test_canonical_string_strips_trailing_zeros() {
        assert_eq!(a("1.2300").to_canonical_string(), "1.23");
        assert_eq!(a("100").to_string(), "100");
        assert_eq!(a("1.2300"), a("1.23"));
    }

    #[test]
    fn test_checked_sub_never_goes_negative() {
        assert_eq!(a("5").checked_sub(a("2")), Some(a("3")));
        assert_eq!(a("2").checked_sub(a("5")), None);
        assert_eq!(a("2").saturating_sub(a("5")), Amount::ZERO);
    }

    #[test]
    fn test_scaling() {
        assert_eq!(a("10").checked_mul(Decimal::new(5, 1)), Some(a("5")));
        assert_eq!(a("10").checked_mul(Decimal::new(-1, 0)), None);
        assert_eq!(a("10").checked_div(Decimal::ZERO), None);
        assert_eq!(a("100").less_bps(50), Some(a("99.5")));
        assert_eq!(a("100").plus_bps(50), Some(a("100.5")));
        assert_eq!(a("100").less_bps(10_001), None);
    }

    #[test]
    fn test_json_is_string() {
        let json = serde_json::to_value(a("30.5")).unwrap();
        assert_eq!(json, serde_json::Value::String("30.5".to_string()));
        let back: Amount = serde_json::from_value(json).unwrap();
        assert_eq!(back, a("30.5"));
        assert!(serde_json::from_str::<Amount>("\"-3\"").is_err());

        let haircut = a("30").less_bps(50).unwrap();
        assert_eq!(serde_json::to_value(haircut).unwrap(), "29.85");
    }

    #[test]
    fn test_leverage_arithmetic_is_exact_enough() {
        let borrow = a("30")
            .checked_mul(Decimal::from(101))
            .and_then(|x| x.checked_div(Decimal::from(99)))
            .unwrap();
        let total = a("1").checked_add(borrow).unwrap();
        assert!(total > a("31"));
        assert_eq!(total.checked_sub(borrow).map(|r| r >= a("0.99")), Some(true));
    }
}
