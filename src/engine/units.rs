//! Conversion between currency amounts and the ledger's integer encoding.
//!
//! Every wire amount in the crate is produced here so that one collateral
//! kind is always encoded at one precision.

use crate::config::CurrencyConfig;
use crate::domain::{CurrencyAmount, CurrencyKind, Decimal, ScaleError};
use crate::error::CdpError;
use crate::ledger::CdpTypeRegistry;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Number of decimals in a currency's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precision(u32);

impl Precision {
    /// 18 decimals, the native asset's unit.
    pub const WEI: Precision = Precision(18);

    pub fn new(decimals: u32) -> Self {
        Precision(decimals)
    }

    pub fn decimals(&self) -> u32 {
        self.0
    }
}

/// An integer count of a currency's smallest unit. Serialized as a decimal
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WireAmount(U256);

impl WireAmount {
    pub fn zero() -> Self {
        WireAmount(U256::ZERO)
    }
}

impl fmt::Display for WireAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WireAmount {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ScaleError::NotAnInteger(s.to_string()));
        }
        U256::from_str_radix(s, 10)
            .map(WireAmount)
            .map_err(|_| ScaleError::NotAnInteger(s.to_string()))
    }
}

impl TryFrom<String> for WireAmount {
    type Error = ScaleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WireAmount> for String {
    fn from(value: WireAmount) -> Self {
        value.0.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct UnitConverter {
    currencies: CurrencyConfig,
    types: Arc<dyn CdpTypeRegistry>,
}

impl UnitConverter {
    pub fn new(currencies: CurrencyConfig, types: Arc<dyn CdpTypeRegistry>) -> Self {
        Self { currencies, types }
    }

    pub fn currencies(&self) -> &CurrencyConfig {
        &self.currencies
    }

    pub fn is_native(&self, kind: &CurrencyKind) -> bool {
        self.currencies.is_native(kind)
    }

    /// Precision the ledger expects for `kind`.
    ///
    /// Native asset: the native unit. Debt currency: its configured decimals.
    /// Anything else: the decimals registered for the kind.
    pub fn precision_for(&self, kind: &CurrencyKind) -> Result<Precision, CdpError> {
        if self.currencies.is_native(kind) {
            return Ok(Precision::new(self.currencies.native_decimals));
        }
        if self.currencies.is_debt(kind) {
            return Ok(Precision::new(self.currencies.debt_decimals));
        }
        self.types
            .cdp_types()
            .iter()
            .find(|t| &t.currency == kind)
            .map(|t| Precision::new(t.decimals))
            .ok_or_else(|| {
                CdpError::InvalidArgument(format!("no registered precision for currency {}", kind))
            })
    }

    /// Encode `amount` at the precision of its currency, truncating excess digits.
    pub fn to_wire(&self, amount: &CurrencyAmount) -> Result<WireAmount, CdpError> {
        let precision = self.precision_for(amount.kind())?;
        let raw = amount.value().to_base_units(precision.decimals())?;
        Ok(WireAmount(raw))
    }

    /// Decode a wire integer back into an amount of `kind`.
    pub fn from_wire(
        &self,
        kind: &CurrencyKind,
        wire: WireAmount,
    ) -> Result<CurrencyAmount, CdpError> {
        let precision = self.precision_for(kind)?;
        let value = Decimal::from_base_units(wire.0, precision.decimals())?;
        CurrencyAmount::new(kind.clone(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CdpType;
    use crate::ledger::StaticCdpTypes;
    use std::str::FromStr;

    fn converter() -> UnitConverter {
        let types = StaticCdpTypes::new(vec![
            CdpType::new("ETH-A", "ETH", 18),
            CdpType::new("USDC-A", "USDC", 6),
            CdpType::new("WBTC-A", "WBTC", 8),
            CdpType::new("GNT-A", "GNT", 18),
            CdpType::new("SHIB-A", "SHIB", 18),
        ]);
        UnitConverter::new(CurrencyConfig::default(), Arc::new(types))
    }

    fn amount(symbol: &str, value: &str) -> CurrencyAmount {
        CurrencyKind::new(symbol)
            .amount(Decimal::from_str(value).unwrap())
            .unwrap()
    }

    #[test]
    fn test_native_precision_is_wei() {
        let c = converter();
        assert_eq!(
            c.precision_for(&CurrencyKind::new("ETH")).unwrap(),
            Precision::WEI
        );
    }

    #[test]
    fn test_native_precision_ignores_registry() {
        let types = StaticCdpTypes::new(vec![CdpType::new("ETH-X", "ETH", 6)]);
        let c = UnitConverter::new(CurrencyConfig::default(), Arc::new(types));
        assert_eq!(
            c.precision_for(&CurrencyKind::new("ETH")).unwrap(),
            Precision::WEI
        );
    }

    #[test]
    fn test_token_precision_from_registry() {
        let c = converter();
        assert_eq!(
            c.precision_for(&CurrencyKind::new("USDC")).unwrap(),
            Precision::new(6)
        );
        assert_eq!(
            c.precision_for(&CurrencyKind::new("WBTC")).unwrap(),
            Precision::new(8)
        );
    }

    #[test]
    fn test_debt_precision() {
        let c = converter();
        assert_eq!(
            c.precision_for(&CurrencyKind::new("MDAI")).unwrap(),
            Precision::new(18)
        );
    }

    #[test]
    fn test_unknown_currency() {
        let c = converter();
        let err = c.precision_for(&CurrencyKind::new("ZRX")).unwrap_err();
        assert!(matches!(err, CdpError::InvalidArgument(_)));
    }

    #[test]
    fn test_to_wire_per_kind() {
        let c = converter();
        assert_eq!(
            c.to_wire(&amount("ETH", "1.5")).unwrap().to_string(),
            "1500000000000000000"
        );
        assert_eq!(c.to_wire(&amount("USDC", "20.25")).unwrap().to_string(), "20250000");
        assert_eq!(c.to_wire(&amount("WBTC", "0.01")).unwrap().to_string(), "1000000");
    }

    #[test]
    fn test_to_wire_beyond_decimal_mantissa() {
        let c = converter();
        let wire = c.to_wire(&amount("SHIB", "100000000000")).unwrap();
        assert_eq!(wire.to_string(), "100000000000000000000000000000");
        assert_eq!(
            c.from_wire(&CurrencyKind::new("SHIB"), wire).unwrap().value(),
            Decimal::from_str("100000000000").unwrap()
        );
    }

    #[test]
    fn test_wire_amount_serializes_as_decimal_string() {
        let wire = WireAmount::from_str("20250000").unwrap();
        assert_eq!(serde_json::to_value(wire).unwrap(), serde_json::json!("20250000"));
        let back: WireAmount = serde_json::from_value(serde_json::json!("20250000")).unwrap();
        assert_eq!(back, wire);
        assert!(serde_json::from_value::<WireAmount>(serde_json::json!("1.5")).is_err());
    }

    #[test]
    fn test_wire_roundtrip_zero_one_and_truncation() {
        let c = converter();
        for (value, expected) in [
            ("0", "0"),
            ("1", "1"),
            ("1.123456789", "1.123456"),
            ("0.0000009", "0"),
        ] {
            let wire = c.to_wire(&amount("USDC", value)).unwrap();
            let back = c.from_wire(&CurrencyKind::new("USDC"), wire).unwrap();
            assert_eq!(back.value(), Decimal::from_str(expected).unwrap(), "value {}", value);
        }
    }
}
