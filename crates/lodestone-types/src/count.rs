//! Unbounded whole-number item counter.
//!
//! Lifetime sales are never capped: an [`ItemCount`] is a non-negative
//! integer of any size. It travels as a decimal string in JSON and in the
//! key store. Bare JSON integers are accepted on input.

use core::fmt;
use core::str::FromStr;

use num_bigint::{BigUint, ParseBigIntError};
use num_traits::{CheckedSub, One, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A non-negative whole number of items with no upper bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemCount(BigUint);

impl ItemCount {
    /// No items.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Whether the count is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether the count is exactly one.
    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    /// Add `more` in place.
    #[allow(clippy::arithmetic_side_effects)] // BigUint addition grows instead of overflowing.
    pub fn accrue(&mut self, more: &Self) {
        self.0 += &more.0;
    }

    /// Growth of `self` over `baseline`, zero when `baseline` is ahead.
    pub fn since(&self, baseline: &Self) -> Self {
        self.0
            .checked_sub(&baseline.0)
            .map_or_else(Self::zero, Self)
    }

    /// The underlying big integer.
    pub const fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for ItemCount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u32> for ItemCount {
    fn from(value: u32) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for ItemCount {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl FromStr for ItemCount {
    type Err = ParseBigIntError;

    /// Parse plain decimal digits. Signs other than a single leading `+`,
    /// fractions and exponents are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigUint::from_str(s.trim()).map(Self)
    }
}

impl fmt::Display for ItemCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for ItemCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct ItemCountVisitor;

impl Visitor<'_> for ItemCountVisitor {
    type Value = ItemCount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative whole number or a string of decimal digits")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(ItemCount::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(ItemCount::from)
            .map_err(|_negative| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse()
            .map_err(|_bad| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for ItemCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ItemCountVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TWO_POW_100: &str = "1267650600228229401496703205376";

    #[test]
    fn parses_beyond_fixed_width_decimals() {
        let count: ItemCount = TWO_POW_100.parse().unwrap();
        assert_eq!(count.to_string(), TWO_POW_100);
    }

    #[test]
    fn rejects_fractions_and_signs() {
        assert!("1.5".parse::<ItemCount>().is_err());
        assert!("-3".parse::<ItemCount>().is_err());
        assert!("".parse::<ItemCount>().is_err());
        assert!("1e3".parse::<ItemCount>().is_err());
    }

    #[test]
    fn accrue_grows_without_bound() {
        let mut count: ItemCount = TWO_POW_100.parse().unwrap();
        count.accrue(&ItemCount::from(5_u32));
        count.accrue(&ItemCount::from(7_u32));
        assert_eq!(count.to_string(), "1267650600228229401496703205388");
        let base: ItemCount = TWO_POW_100.parse().unwrap();
        assert_eq!(count.since(&base), ItemCount::from(12_u32));
    }

    #[test]
    fn since_clamps_at_zero() {
        let low = ItemCount::from(3_u32);
        let high = ItemCount::from(9_u32);
        assert!(low.since(&high).is_zero());
        assert_eq!(high.since(&low), ItemCount::from(6_u32));
    }

    #[test]
    fn json_uses_strings_and_accepts_integers() {
        let count: ItemCount = TWO_POW_100.parse().unwrap();
        let json = serde_json::to_string(&count).unwrap();
        assert_eq!(json, format!("\"{TWO_POW_100}\""));
        assert_eq!(serde_json::from_str::<ItemCount>(&json).unwrap(), count);

        assert_eq!(
            serde_json::from_str::<ItemCount>("42").unwrap(),
            ItemCount::from(42_u32)
        );
        assert!(serde_json::from_str::<ItemCount>("-1").is_err());
        assert!(serde_json::from_str::<ItemCount>("\"1.5\"").is_err());
        assert!(serde_json::from_str::<ItemCount>("1.5").is_err());
    }
}
