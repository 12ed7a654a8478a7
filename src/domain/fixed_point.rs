//! Newtype wrappers for the ledger's fixed-point integers.
//!
//! The vault stores collateral and debt as WAD-scaled (18 decimals) values
//! regardless of the token's own precision; accrual rates are RAY-scaled
//! (27 decimals). Values stay `U256` until they are read as human amounts.

use crate::domain::{Decimal, ScaleError};
use alloy_primitives::{uint, I256, U256};
use std::fmt;

fn parse_unsigned(raw: &str) -> Result<U256, ScaleError> {
    let digits = raw.trim();
    if digits.is_empty() {
        return Err(ScaleError::NotAnInteger(raw.to_string()));
    }
    U256::from_str_radix(digits, 10).map_err(|_| ScaleError::NotAnInteger(raw.to_string()))
}

/// WAD-scaled ledger balance (18 decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wad(U256);

impl Wad {
    pub const DECIMALS: u32 = 18;

    pub fn from_raw(raw: U256) -> Self {
        Wad(raw)
    }

    pub fn raw(self) -> U256 {
        self.0
    }

    /// Parse a non-negative base-unit integer string.
    pub fn parse(raw: &str) -> Result<Self, ScaleError> {
        parse_unsigned(raw).map(Wad)
    }

    pub fn to_decimal(self) -> Result<Decimal, ScaleError> {
        Decimal::from_base_units(self.0, Self::DECIMALS)
    }

    /// `self * rate`, truncated to WAD resolution. `None` past `U256::MAX`.
    pub fn rmul(self, rate: Ray) -> Option<Wad> {
        self.0.checked_mul(rate.0).map(|v| Wad(v / Ray::ONE.0))
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// RAY-scaled accrual rate (27 decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ray(U256);

impl Ray {
    pub const ONE: Ray = Ray(uint!(1_000_000_000_000_000_000_000_000_000_U256));

    pub fn parse(raw: &str) -> Result<Self, ScaleError> {
        parse_unsigned(raw).map(Ray)
    }
}

/// Signed WAD change carried by a history entry (`dink`, `dart`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WadDelta(I256);

impl WadDelta {
    pub fn parse(raw: &str) -> Result<Self, ScaleError> {
        I256::from_dec_str(raw.trim())
            .map(WadDelta)
            .map_err(|_| ScaleError::NotAnInteger(raw.to_string()))
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn magnitude(&self) -> Wad {
        Wad(self.0.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_wad_beyond_decimal_mantissa() {
        let wad = Wad::parse("100000000000000000000000000000").unwrap();
        assert_eq!(wad.to_decimal().unwrap(), d("100000000000"));
    }

    #[test]
    fn test_uint256_max_parses() {
        let max = U256::MAX.to_string();
        assert_eq!(Wad::parse(&max).unwrap().raw(), U256::MAX);
    }

    #[test]
    fn test_rejects_fractional_and_negative() {
        assert!(matches!(Wad::parse("1.5"), Err(ScaleError::NotAnInteger(_))));
        assert!(matches!(Wad::parse("-1"), Err(ScaleError::NotAnInteger(_))));
        assert!(matches!(Ray::parse("abc"), Err(ScaleError::NotAnInteger(_))));
    }

    #[test]
    fn test_rmul_scales_by_rate() {
        let art = Wad::parse("100000000000000000000").unwrap();
        let rate = Ray::parse("1050000000000000000000000000").unwrap();
        assert_eq!(art.rmul(rate).unwrap().to_decimal().unwrap(), d("105"));
        assert_eq!(art.rmul(Ray::ONE), Some(art));
    }

    #[test]
    fn test_rmul_overflow() {
        assert_eq!(Wad::from_raw(U256::MAX).rmul(Ray::ONE), None);
    }

    #[test]
    fn test_delta_sign_and_magnitude() {
        let freed = WadDelta::parse("-500").unwrap();
        assert!(freed.is_negative());
        assert_eq!(freed.magnitude(), Wad::from_raw(U256::from(500u64)));

        let locked = WadDelta::parse("100000000000000000000000000000").unwrap();
        assert!(locked.is_positive());
        assert_eq!(locked.magnitude().to_decimal().unwrap(), d("100000000000"));

        let unchanged = WadDelta::parse("0").unwrap();
        assert!(!unchanged.is_positive() && !unchanged.is_negative());
        assert!(matches!(WadDelta::parse("lots"), Err(ScaleError::NotAnInteger(_))));
    }
}
