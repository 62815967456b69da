//! Integer money type.
//!
//! All balances and amounts are whole cents. Percentage allocations use
//! basis points (1/100 of a percent) so no floating-point arithmetic ever
//! touches a balance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of basis points in 100%.
pub const BASIS_POINTS_SCALE: i64 = 10_000;

/// A monetary amount in whole cents.
///
/// Engine operations validate amounts before any arithmetic, so balances
/// held by entities are always non-negative; the signed representation
/// exists so intermediate quantities (e.g. the unallocated residue of an
/// account) can legitimately go below zero.
///
/// # Examples
///
/// ```
/// use safe_to_spend::Cents;
///
/// let amount = Cents::new(150_00);
/// assert_eq!(amount.to_string(), "150.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    /// Zero value.
    pub const ZERO: Self = Cents(0);

    /// Creates an amount from a raw cent count.
    pub const fn new(cents: i64) -> Self {
        Cents(cents)
    }

    /// Raw cent count.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Returns `true` if this amount is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if this amount is strictly positive.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// The smaller of two amounts.
    pub fn min(self, other: Self) -> Self {
        Cents(self.0.min(other.0))
    }

    /// The share of this amount described by `basis_points`, rounded down.
    ///
    /// `Cents::new(50_000).share(1_000)` is 10% of 500.00 = 50.00. The
    /// product is taken in 128 bits so amounts near `i64::MAX` cannot
    /// overflow the intermediate.
    pub fn share(self, basis_points: u32) -> Self {
        let product = i128::from(self.0) * i128::from(basis_points);
        Cents((product / i128::from(BASIS_POINTS_SCALE)) as i64)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Cents {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Cents {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Cents(self.0 - rhs.0)
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Cents::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats_dollars_and_cents() {
        assert_eq!(Cents::new(0).to_string(), "0.00");
        assert_eq!(Cents::new(5).to_string(), "0.05");
        assert_eq!(Cents::new(150_00).to_string(), "150.00");
        assert_eq!(Cents::new(1234).to_string(), "12.34");
        assert_eq!(Cents::new(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_share_rounds_down() {
        // 10% of 500.00
        assert_eq!(Cents::new(50_000).share(1_000), Cents::new(5_000));
        // 33.33% of 1.00 -> floor(33.33)
        assert_eq!(Cents::new(100).share(3_333), Cents::new(33));
        // 100% is the identity
        assert_eq!(Cents::new(777).share(10_000), Cents::new(777));
        // tiny remainders floor to zero
        assert_eq!(Cents::new(9).share(1_000), Cents::ZERO);
    }

    #[test]
    fn test_share_of_huge_amounts_does_not_overflow() {
        assert_eq!(Cents::new(i64::MAX).share(10_000), Cents::new(i64::MAX));
        assert_eq!(
            Cents::new(2_000_000_000_000_000).share(5_000),
            Cents::new(1_000_000_000_000_000)
        );
    }

    #[test]
    fn test_arithmetic() {
        let mut a = Cents::new(100);
        a += Cents::new(50);
        assert_eq!(a, Cents::new(150));
        a -= Cents::new(200);
        assert_eq!(a, Cents::new(-50));
        assert_eq!(Cents::new(10) + Cents::new(5), Cents::new(15));
        assert_eq!(Cents::new(10) - Cents::new(5), Cents::new(5));
    }

    #[test]
    fn test_sum_over_iterator() {
        let total: Cents = [Cents::new(1), Cents::new(2), Cents::new(3)]
            .into_iter()
            .sum();
        assert_eq!(total, Cents::new(6));
    }
}
