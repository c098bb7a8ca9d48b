//! Yen amounts.
//!
//! The backend reports every price as a whole number of yen, so amounts are
//! integers and arithmetic is exact. Display uses the `¥1,300` form.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

/// An amount of money in whole yen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Yen(i64);

impl Yen {
    /// Zero yen.
    pub const ZERO: Self = Self(0);

    /// Create an amount from whole yen.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Get the amount in whole yen.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }
}

impl Add for Yen {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Mul<u32> for Yen {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        self.times(rhs)
    }
}

impl Sum for Yen {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Yen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}¥{grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Yen::new(0).to_string(), "¥0");
        assert_eq!(Yen::new(980).to_string(), "¥980");
        assert_eq!(Yen::new(1300).to_string(), "¥1,300");
        assert_eq!(Yen::new(1_234_567).to_string(), "¥1,234,567");
        assert_eq!(Yen::new(-4500).to_string(), "-¥4,500");
    }

    #[test]
    fn test_times_and_sum() {
        let total: Yen = [Yen::new(500) * 2, Yen::new(300) * 1].into_iter().sum();
        assert_eq!(total, Yen::new(1300));
    }
}
