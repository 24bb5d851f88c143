//! HBD amount type.
//!
//! Amounts are represented as fixed-point integers (milli-HBD, three decimal
//! places) to avoid floating-point drift. The ledger itself uses the same
//! precision, so every on-chain amount is exactly representable.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// An HBD amount in milli units (`1.500 HBD` is `1500`).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct HbdAmount(u64);

impl HbdAmount {
    pub const ZERO: Self = Self(0);

    /// Number of decimal places carried by the ledger.
    pub const PRECISION: u32 = 3;

    const SCALE: u64 = 1_000;

    pub fn from_milli(milli: u64) -> Self {
        Self(milli)
    }

    pub fn milli(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a ledger asset string such as `"1.500 HBD"`.
    ///
    /// Only the numeric part is interpreted; the symbol (if any) is ignored.
    /// Up to three decimal places are accepted.
    pub fn parse_asset(asset: &str) -> Result<Self, TypesError> {
        let number = asset
            .split_whitespace()
            .next()
            .ok_or_else(|| TypesError::InvalidAmount(asset.to_string()))?;
        Self::parse_decimal(number).ok_or_else(|| TypesError::InvalidAmount(asset.to_string()))
    }

    fn parse_decimal(s: &str) -> Option<Self> {
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if frac_part.len() > Self::PRECISION as usize {
            return None;
        }
        let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if !digits(int_part) || !digits(frac_part) {
            return None;
        }

        let whole: u64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        let mut frac: u64 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().ok()?
        };
        for _ in frac_part.len()..Self::PRECISION as usize {
            frac *= 10;
        }
        whole.checked_mul(Self::SCALE)?.checked_add(frac).map(Self)
    }

    /// `round(hbd * rate, 3)`: the product is taken on the HBD value, not
    /// on milli units, and then rounded like [`HbdAmount::from_hbd_f64`].
    pub fn scaled_by(self, rate: f64) -> Self {
        if rate <= 0.0 {
            return Self::ZERO;
        }
        Self::from_hbd_f64(self.to_f64() * rate)
    }

    /// Build an amount from a floating-point HBD value, rounding to three places.
    ///
    /// Rounds the exact binary value of `value`, so `0.0045` (stored just
    /// below 0.0045) becomes `0.004`.
    pub fn from_hbd_f64(value: f64) -> Self {
        if value <= 0.0 || !value.is_finite() {
            return Self::ZERO;
        }
        Self::parse_decimal(&format!("{value:.3}")).unwrap_or(Self(u64::MAX))
    }

    /// The amount as a floating-point HBD value (for display and JSON payloads).
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Ledger asset notation, e.g. `"0.075 HBD"`.
    pub fn to_asset_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HbdAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03} HBD", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ledger_asset_strings() {
        assert_eq!(HbdAmount::parse_asset("1.500 HBD").unwrap().milli(), 1500);
        assert_eq!(HbdAmount::parse_asset("0.001 HBD").unwrap().milli(), 1);
        assert_eq!(HbdAmount::parse_asset("12 HBD").unwrap().milli(), 12_000);
        assert_eq!(HbdAmount::parse_asset("2.5").unwrap().milli(), 2500);
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!(HbdAmount::parse_asset("").is_err());
        assert!(HbdAmount::parse_asset("HBD").is_err());
        assert!(HbdAmount::parse_asset("-1.000 HBD").is_err());
        assert!(HbdAmount::parse_asset("1.2345 HBD").is_err());
        assert!(HbdAmount::parse_asset(". HBD").is_err());
    }

    #[test]
    fn displays_three_decimals() {
        assert_eq!(HbdAmount::from_milli(75).to_string(), "0.075 HBD");
        assert_eq!(HbdAmount::from_milli(1500).to_string(), "1.500 HBD");
    }

    #[test]
    fn scaled_by_rounds_to_milli() {
        assert_eq!(HbdAmount::from_milli(1500).scaled_by(0.05).milli(), 75);
        assert_eq!(HbdAmount::from_milli(1500).scaled_by(0.07).milli(), 105);
        assert_eq!(HbdAmount::from_milli(1000).scaled_by(0.0).milli(), 0);
    }

    #[test]
    fn near_half_milli_products_round_on_the_float_value() {
        // 0.045 * 0.10 and 0.090 * 0.05 both land just below 0.0045.
        assert_eq!(HbdAmount::from_milli(45).scaled_by(0.10).milli(), 4);
        assert_eq!(HbdAmount::from_milli(90).scaled_by(0.05).milli(), 4);
    }

    #[test]
    fn from_hbd_f64_handles_edges() {
        assert_eq!(HbdAmount::from_hbd_f64(1.5).milli(), 1_500);
        assert_eq!(HbdAmount::from_hbd_f64(-1.0), HbdAmount::ZERO);
        assert_eq!(HbdAmount::from_hbd_f64(f64::NAN), HbdAmount::ZERO);
    }
}
