//! Collateral kind descriptors.

use crate::domain::{CurrencyKind, Ilk};
use serde::{Deserialize, Serialize};

/// A registered collateral kind: its ilk tag, the currency it locks, and the
/// token's decimal precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdpType {
    pub ilk: Ilk,
    pub currency: CurrencyKind,
    pub decimals: u32,
}

impl CdpType {
    pub fn new(ilk: impl Into<String>, currency: impl AsRef<str>, decimals: u32) -> Self {
        Self {
            ilk: Ilk::new(ilk),
            currency: CurrencyKind::new(currency),
            decimals,
        }
    }
}
