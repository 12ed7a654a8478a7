//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Provides canonical parsing from strings, formatting without exponent notation,
//! and conversion to and from integer counts of a currency's smallest unit.

use alloy_primitives::U256;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest decimal precision representable without overflowing the 96-bit mantissa.
pub const MAX_SCALE: u32 = 28;

/// Lossless decimal numeric type for currency amounts.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to a JSON string so that 18-decimal amounts survive transport.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

/// Failure to move a value between human units and base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScaleError {
    #[error("precision {0} exceeds maximum of {}", MAX_SCALE)]
    PrecisionTooLarge(u32),
    #[error("value overflows at requested precision")]
    Overflow,
    #[error("not an integer base-unit value: {0}")]
    NotAnInteger(String),
    #[error("negative values have no base-unit encoding")]
    Negative,
}

fn unit_scale(precision: u32) -> Result<U256, ScaleError> {
    if precision > MAX_SCALE {
        return Err(ScaleError::PrecisionTooLarge(precision));
    }
    Ok(U256::from(10u64).pow(U256::from(precision)))
}

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Render as an integer count of the smallest unit at `precision` decimals.
    ///
    /// Digits beyond `precision` are truncated toward zero, never rounded up.
    pub fn to_base_units(&self, precision: u32) -> Result<U256, ScaleError> {
        let unit = unit_scale(precision)?;
        let mantissa = u128::try_from(self.0.mantissa()).map_err(|_| ScaleError::Negative)?;
        let mantissa = U256::from(mantissa);
        let scale = self.0.scale();
        if precision >= scale {
            mantissa
                .checked_mul(unit / unit_scale(scale)?)
                .ok_or(ScaleError::Overflow)
        } else {
            Ok(mantissa / (unit_scale(scale)? / unit))
        }
    }

    /// Read an integer count of the smallest unit at `precision` decimals.
    ///
    /// Fraction digits beyond what the 28-digit mantissa holds are truncated.
    pub fn from_base_units(raw: U256, precision: u32) -> Result<Self, ScaleError> {
        let unit = unit_scale(precision)?;
        let whole = (raw / unit).to_string();
        let whole_digits = if whole == "0" { 0 } else { whole.len() };
        if whole_digits > MAX_SCALE as usize {
            return Err(ScaleError::Overflow);
        }
        let keep = (MAX_SCALE as usize - whole_digits).min(precision as usize);
        let text = if keep == 0 {
            whole
        } else {
            let fraction = format!(
                "{:0>width$}",
                (raw % unit).to_string(),
                width = precision as usize
            );
            format!("{}.{}", whole, &fraction[..keep])
        };
        let value = RustDecimal::from_str(&text).map_err(|_| ScaleError::Overflow)?;
        Ok(Decimal(value.normalize()))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}
