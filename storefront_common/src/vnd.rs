use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const VND_CURRENCY_CODE: &str = "VND";

//--------------------------------------         Vnd         ---------------------------------------------------------
/// An amount of Vietnamese dong. The dong has no minor unit, so amounts are whole numbers.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Vnd(i64);

op!(binary Vnd, Add, add);
op!(binary Vnd, Sub, sub);
op!(inplace Vnd, SubAssign, sub_assign);
op!(inplace Vnd, AddAssign, add_assign);
op!(unary Vnd, Neg, neg);

/// Saturates at the `i64` bounds. Use [`Vnd::checked_add`] where an overflow must be reported.
impl Sum for Vnd {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, v| Self(acc.0.saturating_add(v.0)))
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in VND: {0}")]
pub struct VndConversionError(String);

impl From<i64> for Vnd {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Vnd {
    type Error = VndConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(VndConversionError(format!("Value {value} is too large to convert to VND")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

/// Parses amounts the way bank statements print them: `500000`, `500,000`, `500.000` or `500 000`.
impl FromStr for Vnd {
    type Err = VndConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let digits = digits.replace([',', '.', ' ', '_'], "");
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(VndConversionError(format!("'{s}' is not a VND amount")));
        }
        let value = digits.parse::<i64>().map_err(|e| VndConversionError(format!("'{s}': {e}")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for Vnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{grouped}₫")
    }
}

impl Vnd {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `None` for `i64::MIN`, which has no positive counterpart.
    pub fn checked_abs(&self) -> Option<Self> {
        self.0.checked_abs().map(Self)
    }

    pub fn checked_add(&self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(&self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn checked_mul(&self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    /// Returns `percent`% of this amount, rounded toward zero. Computed in 128 bits; a result outside the `i64` range
    /// saturates.
    pub fn percent(&self, percent: i64) -> Self {
        let scaled = i128::from(self.0) * i128::from(percent) / 100;
        Self(i64::try_from(scaled).unwrap_or(if scaled < 0 { i64::MIN } else { i64::MAX }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Vnd::from(0).to_string(), "0₫");
        assert_eq!(Vnd::from(999).to_string(), "999₫");
        assert_eq!(Vnd::from(50_000).to_string(), "50,000₫");
        assert_eq!(Vnd::from(1_250_000).to_string(), "1,250,000₫");
        assert_eq!(Vnd::from(-60_000).to_string(), "-60,000₫");
    }

    #[test]
    fn parse_bank_formats() {
        assert_eq!("500000".parse::<Vnd>().unwrap(), Vnd::from(500_000));
        assert_eq!("500,000".parse::<Vnd>().unwrap(), Vnd::from(500_000));
        assert_eq!("500.000".parse::<Vnd>().unwrap(), Vnd::from(500_000));
        assert_eq!(" 1 200 000 ".parse::<Vnd>().unwrap(), Vnd::from(1_200_000));
        assert_eq!("-20,000".parse::<Vnd>().unwrap(), Vnd::from(-20_000));
        assert!("".parse::<Vnd>().is_err());
        assert!("12a".parse::<Vnd>().is_err());
    }

    #[test]
    fn arithmetic() {
        let mut a = Vnd::from(100_000);
        a -= Vnd::from(60_000);
        assert_eq!(a, Vnd::from(40_000));
        a += Vnd::from(5_000);
        assert_eq!(a, Vnd::from(45_000));
        assert_eq!(-a, Vnd::from(-45_000));
        let total: Vnd = [Vnd::from(1), Vnd::from(2), Vnd::from(3)].into_iter().sum();
        assert_eq!(total, Vnd::from(6));
        assert_eq!(Vnd::from(123_456).percent(5), Vnd::from(6_172));
    }

    #[test]
    fn overflow_is_reported() {
        let big = Vnd::from(i64::MAX / 2 + 1);
        assert_eq!(big.checked_mul(2), None);
        assert_eq!(Vnd::from(10_000).checked_mul(3), Some(Vnd::from(30_000)));
        assert_eq!(big.checked_add(big), None);
        assert_eq!(Vnd::from(i64::MIN).checked_sub(Vnd::from(1)), None);
        assert_eq!(Vnd::from(i64::MIN).checked_abs(), None);
        assert_eq!(Vnd::from(-5).checked_abs(), Some(Vnd::from(5)));
        assert_eq!(Vnd::from(i64::MAX).percent(100), Vnd::from(i64::MAX));
        assert_eq!(Vnd::from(i64::MAX).percent(200), Vnd::from(i64::MAX));
        let total: Vnd = [big, big, big].into_iter().sum();
        assert_eq!(total, Vnd::from(i64::MAX));
    }
}
