//! Tagged currency amounts.

use crate::domain::Decimal;
use crate::error::CdpError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency symbol, e.g. `ETH`, `BAT`, `MDAI`. Stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CurrencyKind(String);

impl CurrencyKind {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        CurrencyKind(symbol.as_ref().trim().to_ascii_uppercase())
    }

    pub fn symbol(&self) -> &str {
        &self.0
    }

    /// An amount of this currency.
    pub fn amount(&self, value: Decimal) -> Result<CurrencyAmount, CdpError> {
        CurrencyAmount::new(self.clone(), value)
    }
}

impl fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative magnitude tagged with its currency.
///
/// Direction is never encoded in the sign; the operation invoked decides it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyAmount {
    kind: CurrencyKind,
    value: Decimal,
}

impl CurrencyAmount {
    /// # Errors
    /// `InvalidArgument` if `value` is negative.
    pub fn new(kind: CurrencyKind, value: Decimal) -> Result<Self, CdpError> {
        if value.is_negative() {
            return Err(CdpError::InvalidArgument(format!(
                "{} amount must not be negative, got {}",
                kind, value
            )));
        }
        if value.is_zero() {
            return Ok(Self::zero(kind));
        }
        Ok(Self { kind, value })
    }

    /// Zero of the given currency.
    pub fn zero(kind: CurrencyKind) -> Self {
        Self {
            kind,
            value: Decimal::zero(),
        }
    }

    pub fn kind(&self) -> &CurrencyKind {
        &self.kind
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_kind(&self, kind: &CurrencyKind) -> bool {
        &self.kind == kind
    }
}

impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_is_normalized() {
        assert_eq!(CurrencyKind::new(" eth "), CurrencyKind::new("ETH"));
        assert_eq!(CurrencyKind::new("bat").symbol(), "BAT");
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = CurrencyKind::new("ETH")
            .amount(Decimal::from_str("-1").unwrap())
            .unwrap_err();
        assert!(matches!(err, CdpError::InvalidArgument(_)));
    }

    #[test]
    fn test_display() {
        let amount = CurrencyKind::new("BAT")
            .amount(Decimal::from_str("12.50").unwrap())
            .unwrap();
        assert_eq!(amount.to_string(), "12.5 BAT");
    }
}
