//! Monetary amounts held as integer minor units.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building or combining [`Money`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount cannot be negative")]
    Negative,

    #[error("amount is out of range")]
    Overflow,
}

/// Money amount in minor units (paise for INR), never negative.
///
/// Persisted as a bare integer so totals are summed exactly. Conversion to
/// and from decimal major units happens only at the HTTP boundary.
/// Deserialization goes through [`Money::from_minor`], so a stored negative
/// amount fails to load.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates an amount from minor units.
    pub fn from_minor(minor: i64) -> Result<Self, MoneyError> {
        if minor < 0 {
            return Err(MoneyError::Negative);
        }
        Ok(Self(minor))
    }

    /// Creates an amount from a decimal major-unit value.
    ///
    /// The value is rounded half away from zero to two decimal places.
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|minor| minor.to_i64())
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the amount as a two-decimal major-unit value.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies a unit price by a quantity.
    pub fn times(self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    pub fn checked_add(self, other: Money) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Sums amounts, failing on overflow.
    pub fn sum<I: IntoIterator<Item = Money>>(amounts: I) -> Result<Self, MoneyError> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(amount))
    }
}

impl TryFrom<i64> for Money {
    type Error = MoneyError;

    fn try_from(minor: i64) -> Result<Self, Self::Error> {
        Money::from_minor(minor)
    }
}

impl From<Money> for i64 {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn from_decimal_converts_to_minor_units() {
        assert_eq!(Money::from_decimal(dec!(10.00)).unwrap().minor(), 1000);
        assert_eq!(Money::from_decimal(dec!(1299.99)).unwrap().minor(), 129_999);
        assert_eq!(Money::from_decimal(dec!(0)).unwrap(), Money::ZERO);
    }

    #[test]
    fn from_decimal_rounds_half_away_from_zero() {
        assert_eq!(Money::from_decimal(dec!(0.125)).unwrap().minor(), 13);
        assert_eq!(Money::from_decimal(dec!(0.124)).unwrap().minor(), 12);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert_eq!(Money::from_decimal(dec!(-1.00)), Err(MoneyError::Negative));
        assert_eq!(Money::from_minor(-5), Err(MoneyError::Negative));
    }

    #[test]
    fn to_decimal_keeps_two_places() {
        let money = Money::from_minor(2000).unwrap();
        assert_eq!(money.to_decimal(), dec!(20.00));
        assert_eq!(money.to_string(), "20.00");
    }

    #[test]
    fn arithmetic_is_checked() {
        let price = Money::from_minor(1000).unwrap();
        assert_eq!(price.times(3).unwrap().minor(), 3000);
        assert_eq!(
            Money::from_minor(i64::MAX).unwrap().times(2),
            Err(MoneyError::Overflow)
        );

        let total = Money::sum([price, price.times(2).unwrap()]).unwrap();
        assert_eq!(total.minor(), 3000);
    }

    #[test]
    fn serializes_as_bare_integer() {
        let money = Money::from_minor(4250).unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "4250");
        assert_eq!(serde_json::from_str::<Money>("4250").unwrap(), money);
    }

    #[test]
    fn negative_stored_amount_does_not_deserialize() {
        let err = serde_json::from_str::<Money>("-1").unwrap_err();
        assert!(err.to_string().contains("negative"), "{err}");
    }
}
