//! `Coins`: fixed-point amount used for every balance in the network.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Amount of coins, stored as whole milli-coins.
///
/// Rewards such as `0.1` per mined transaction are exact in this unit.
/// Serialized as a JSON number (`100.1`).
///
/// Arithmetic saturates at the `i64` bounds instead of overflowing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Coins(i64);

impl ValueObject for Coins {}

impl Coins {
    pub const MILLIS_PER_COIN: i64 = 1_000;

    pub const ZERO: Coins = Coins(0);

    pub const MAX: Coins = Coins(i64::MAX);

    pub const MIN: Coins = Coins(i64::MIN);

    /// Whole coins.
    pub const fn new(whole: i64) -> Self {
        Self(whole.saturating_mul(Self::MILLIS_PER_COIN))
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `self * count`, e.g. a per-transaction reward times the pool size.
    pub fn times(self, count: usize) -> Self {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        Self(self.0.saturating_mul(count))
    }
}

impl Add for Coins {
    type Output = Coins;

    fn add(self, rhs: Coins) -> Coins {
        Coins(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Coins {
    type Output = Coins;

    fn sub(self, rhs: Coins) -> Coins {
        Coins(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Coins {
    type Output = Coins;

    fn neg(self) -> Coins {
        Coins(self.0.saturating_neg())
    }
}

impl AddAssign for Coins {
    fn add_assign(&mut self, rhs: Coins) {
        *self = *self + rhs;
    }
}

impl SubAssign for Coins {
    fn sub_assign(&mut self, rhs: Coins) {
        *self = *self - rhs;
    }
}

impl Sum for Coins {
    fn sum<I: Iterator<Item = Coins>>(iter: I) -> Coins {
        iter.fold(Coins::ZERO, Add::add)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = Self::MILLIS_PER_COIN as u64;
        let (whole, frac) = (abs / per, abs % per);
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let frac = format!("{frac:03}");
            write!(f, "{sign}{whole}.{}", frac.trim_end_matches('0'))
        }
    }
}

impl FromStr for Coins {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        let is_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !is_digits(whole) || !is_digits(frac) {
            return Err(DomainError::invalid_amount(format!("not a decimal number: {s:?}")));
        }
        if frac.len() > 3 {
            return Err(DomainError::invalid_amount(format!(
                "at most three decimal places allowed: {s:?}"
            )));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| DomainError::invalid_amount(format!("out of range: {s:?}")))?;
        let frac: i64 = format!("{frac:0<3}")
            .parse()
            .map_err(|_| DomainError::invalid_amount(format!("out of range: {s:?}")))?;

        let millis = whole
            .checked_mul(Self::MILLIS_PER_COIN)
            .and_then(|m| m.checked_add(frac))
            .ok_or_else(|| DomainError::invalid_amount(format!("out of range: {s:?}")))?;

        Ok(Coins(if negative { -millis } else { millis }))
    }
}

impl TryFrom<f64> for Coins {
    type Error = DomainError;

    /// Rounds to the nearest milli-coin.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(DomainError::invalid_amount(format!("{value} is not finite")));
        }
        let scaled = (value * Self::MILLIS_PER_COIN as f64).round();
        if scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
            return Err(DomainError::invalid_amount(format!("{value} is out of range")));
        }
        Ok(Coins(scaled as i64))
    }
}

impl From<Coins> for f64 {
    fn from(value: Coins) -> Self {
        value.0 as f64 / Coins::MILLIS_PER_COIN as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Coins::new(100).to_string(), "100");
        assert_eq!(Coins::from_millis(100_100).to_string(), "100.1");
        assert_eq!(Coins::from_millis(-2_500).to_string(), "-2.5");
        assert_eq!(Coins::from_millis(-5).to_string(), "-0.005");
    }

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("0.1".parse::<Coins>().unwrap(), Coins::from_millis(100));
        assert_eq!("-20".parse::<Coins>().unwrap(), Coins::new(-20));
        assert_eq!("+5.25".parse::<Coins>().unwrap(), Coins::from_millis(5_250));
        assert!("1.0001".parse::<Coins>().is_err());
        assert!(".5".parse::<Coins>().is_err());
        assert!("abc".parse::<Coins>().is_err());
    }

    #[test]
    fn f64_conversion_rounds_to_millis() {
        assert_eq!(Coins::try_from(0.1).unwrap(), Coins::from_millis(100));
        assert_eq!(Coins::try_from(2.0004).unwrap(), Coins::from_millis(2_000));
        assert!(Coins::try_from(f64::NAN).is_err());
        assert_eq!(f64::from(Coins::from_millis(1_500)), 1.5);
    }

    #[test]
    fn serializes_as_json_number() {
        let json = serde_json::to_string(&Coins::from_millis(100_100)).unwrap();
        assert_eq!(json, "100.1");
        let back: Coins = serde_json::from_str("5").unwrap();
        assert_eq!(back, Coins::new(5));
    }

    #[test]
    fn times_scales_by_count() {
        assert_eq!(Coins::from_millis(100).times(3), Coins::from_millis(300));
        assert_eq!(Coins::from_millis(100).times(0), Coins::ZERO);
    }

    #[test]
    fn arithmetic_saturates_at_the_bounds() {
        assert_eq!(Coins::MAX + Coins::new(1), Coins::MAX);
        assert_eq!(Coins::MIN - Coins::new(1), Coins::MIN);
        assert_eq!(-Coins::MIN, Coins::MAX);
        assert_eq!(Coins::new(i64::MAX), Coins::MAX);
        assert_eq!(Coins::from_millis(i64::MAX / 2).times(usize::MAX), Coins::MAX);

        let mut balance = Coins::try_from(9.0e15).unwrap();
        balance += Coins::try_from(9.0e15).unwrap();
        assert_eq!(balance, Coins::MAX);
        assert_eq!([Coins::MAX, Coins::MAX].into_iter().sum::<Coins>(), Coins::MAX);
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(millis in -1_000_000_000i64..1_000_000_000i64) {
            let coins = Coins::from_millis(millis);
            prop_assert_eq!(coins.to_string().parse::<Coins>().unwrap(), coins);
        }
    }
}
