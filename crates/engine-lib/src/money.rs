//! Fixed-point money representation
//!
//! All monetary values move through the engine as integer nano-USD
//! (1 USD = 1_000_000_000 nanos). Sums and unit-price products stay in
//! integer arithmetic; floating point appears only at configuration and
//! display edges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Nanos per whole US dollar
pub const NANOS_PER_USD: i64 = 1_000_000_000;

/// A USD amount with nano-dollar precision
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Usd(i64);

impl Usd {
    pub const ZERO: Usd = Usd(0);

    /// Construct from raw nano-USD
    pub const fn from_nanos(nanos: i64) -> Self {
        Usd(nanos)
    }

    /// Construct from a dollar figure (config / display edge only).
    /// Rounds to the nearest nano.
    pub fn from_usd(dollars: f64) -> Self {
        Usd((dollars * NANOS_PER_USD as f64).round() as i64)
    }

    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    /// Dollar figure for display and JSON convenience fields
    pub fn as_usd(&self) -> f64 {
        self.0 as f64 / NANOS_PER_USD as f64
    }

    /// Multiply a per-unit price by a unit count. Widens through i128 so
    /// large token counts cannot overflow the product, then saturates on
    /// the way back.
    pub fn mul_units(&self, units: u64) -> Usd {
        let product = self.0 as i128 * units as i128;
        Usd(product.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Scale by a float fraction (budget thresholds). Used for comparisons
    /// only, never accumulated.
    pub fn scale(&self, factor: f64) -> Usd {
        Usd((self.0 as f64 * factor).round() as i64)
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(&self, other: Usd) -> Usd {
        Usd(self.0.saturating_add(other.0))
    }
}

impl Add for Usd {
    type Output = Usd;

    fn add(self, rhs: Usd) -> Usd {
        Usd(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Usd {
    fn add_assign(&mut self, rhs: Usd) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Usd {
    type Output = Usd;

    fn sub(self, rhs: Usd) -> Usd {
        Usd(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Usd {
    fn sum<I: Iterator<Item = Usd>>(iter: I) -> Usd {
        iter.fold(Usd::ZERO, |acc, x| acc + x)
    }
}

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let dollars = abs / NANOS_PER_USD as u64;
        let micros = (abs % NANOS_PER_USD as u64) / 1_000;
        write!(f, "{}${}.{:06}", sign, dollars, micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_usd_round_trip() {
        let price = Usd::from_usd(0.002);
        assert_eq!(price.as_nanos(), 2_000_000);
        assert!((price.as_usd() - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_mul_units_stays_exact_for_large_counts() {
        // 2 micro-dollars per token, one billion tokens
        let per_token = Usd::from_nanos(2_000);
        let total = per_token.mul_units(1_000_000_000);
        assert_eq!(total.as_nanos(), 2_000_000_000_000);
        assert!((total.as_usd() - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_integer_sum_has_no_float_drift() {
        // 0.1 + 0.2 style drift cannot happen in nanos
        let parts = vec![Usd::from_usd(0.1), Usd::from_usd(0.2)];
        let total: Usd = parts.into_iter().sum();
        assert_eq!(total, Usd::from_usd(0.3));
    }

    #[test]
    fn test_display_formats_micros() {
        assert_eq!(Usd::from_usd(1.5).to_string(), "$1.500000");
        assert_eq!(Usd::from_nanos(2_500).to_string(), "$0.000002");
        assert_eq!(Usd::from_usd(-0.25).to_string(), "-$0.250000");
    }

    #[test]
    fn test_scale_for_threshold_comparison() {
        let budget = Usd::from_usd(100.0);
        assert_eq!(budget.scale(0.8), Usd::from_usd(80.0));
    }
}
