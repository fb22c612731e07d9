//! Type-safe price representation using decimal arithmetic.
//!
//! Prices travel over the wire as plain JSON numbers (`19.99`) but are held
//! as [`Decimal`] so cart totals never accumulate floating point drift.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A price in the store's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Whole-number percentage saved against `original`, if it is a real discount.
    #[must_use]
    pub fn discount_percent_from(self, original: Self) -> Option<u8> {
        if original.0 <= self.0 || original.0 <= Decimal::ZERO {
            return None;
        }
        let saved = (original.0 - self.0) / original.0 * Decimal::ONE_HUNDRED;
        saved.round().to_u8().filter(|pct| *pct > 0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        rust_decimal::serde::float::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_a_number() {
        let price = Price::from_cents(1999);
        assert_eq!(serde_json::to_string(&price).unwrap(), "19.99");

        let parsed: Price = serde_json::from_str("19.99").unwrap();
        assert_eq!(parsed, price);

        let whole: Price = serde_json::from_str("25").unwrap();
        assert_eq!(whole, Price::from_cents(2500));
    }

    #[test]
    fn test_times_and_sum() {
        let total: Price = [Price::from_cents(1050).times(2), Price::from_cents(99).times(3)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(2397));
        assert_eq!(total.to_string(), "23.97");
    }

    #[test]
    fn test_sum_of_nothing_is_zero() {
        let total: Price = core::iter::empty().sum();
        assert_eq!(total, Price::ZERO);
    }

    #[test]
    fn test_discount_percent() {
        let sale = Price::from_cents(7500);
        assert_eq!(sale.discount_percent_from(Price::from_cents(10000)), Some(25));
        assert_eq!(sale.discount_percent_from(Price::from_cents(7500)), None);
        assert_eq!(sale.discount_percent_from(Price::from_cents(5000)), None);
    }
}
