//! Reconstruction of position changes from raw ledger history.
//!
//! Collateral and debt are stored by the ledger in 18-decimal units regardless
//! of the token's own precision; accrual rates are 27-decimal fixed point.

use crate::config::CurrencyConfig;
use crate::domain::{
    Address, CollateralAction, CurrencyAmount, CurrencyKind, DebtAction, Ilk,
    PositionEventRecord, RawFrobEvent, Ray, ScaleError, TxHash, Wad, WadDelta,
};
use crate::error::CdpError;
use crate::ledger::CdpTypeRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EventTranslator {
    currencies: CurrencyConfig,
    types: Arc<dyn CdpTypeRegistry>,
}

impl EventTranslator {
    pub fn new(currencies: CurrencyConfig, types: Arc<dyn CdpTypeRegistry>) -> Self {
        Self { currencies, types }
    }

    /// Translate raw events into records, preserving input order.
    ///
    /// # Errors
    /// `InvariantViolation` on the first malformed event; no partial result.
    pub fn translate(&self, events: &[RawFrobEvent]) -> Result<Vec<PositionEventRecord>, CdpError> {
        events.iter().map(|e| self.translate_one(e)).collect()
    }

    fn translate_one(&self, event: &RawFrobEvent) -> Result<PositionEventRecord, CdpError> {
        let tx_hash = &event.tx.transaction_hash;
        let ilk = Ilk::new(event.ilk_identifier.as_str());
        let currency = self
            .types
            .cdp_type(None, Some(&ilk))
            .map_err(|e| malformed(tx_hash, &format!("unknown ilk {}: {}", ilk, e)))?
            .currency;
        let debt = &self.currencies.debt;

        let dink = field(tx_hash, "dink", WadDelta::parse(&event.dink))?;
        let dart = field(tx_hash, "dart", WadDelta::parse(&event.dart))?;
        let rate = field(tx_hash, "rate", Ray::parse(&event.ilk.rate))?;

        let collateral_action = if dink.is_positive() {
            Some(CollateralAction::Lock)
        } else if dink.is_negative() {
            Some(CollateralAction::Free)
        } else {
            None
        };
        let debt_action = if dart.is_positive() {
            Some(DebtAction::Draw)
        } else if dart.is_negative() {
            Some(DebtAction::Wipe)
        } else {
            None
        };

        let debt_change = dart
            .magnitude()
            .rmul(rate)
            .ok_or_else(|| malformed(tx_hash, "debt change overflows"))?;

        let snapshot = event
            .urn
            .nodes
            .first()
            .ok_or_else(|| malformed(tx_hash, "missing post-event urn snapshot"))?;
        let ink = field(tx_hash, "ink", Wad::parse(&snapshot.ink))?;
        let art = field(tx_hash, "art", Wad::parse(&snapshot.art))?;

        let time = DateTime::parse_from_rfc3339(&event.tx.era.iso)
            .map_err(|e| malformed(tx_hash, &format!("bad timestamp {}: {}", event.tx.era.iso, e)))?
            .with_timezone(&Utc);

        Ok(PositionEventRecord {
            transaction_hash: TxHash::new(tx_hash.as_str()),
            ilk,
            time,
            sender_address: Address::new(event.tx.tx_from.as_str()),
            change_in_collateral: magnitude(tx_hash, &currency, dink.magnitude())?,
            collateral_action,
            change_in_debt: magnitude(tx_hash, debt, debt_change)?,
            debt_action,
            resulting_collateral: magnitude(tx_hash, &currency, ink)?,
            resulting_debt: magnitude(tx_hash, debt, art)?,
        })
    }
}

fn field<T>(tx_hash: &str, name: &str, parsed: Result<T, ScaleError>) -> Result<T, CdpError> {
    parsed.map_err(|e| malformed(tx_hash, &format!("{}: {}", name, e)))
}

fn magnitude(tx_hash: &str, kind: &CurrencyKind, value: Wad) -> Result<CurrencyAmount, CdpError> {
    let value = field(tx_hash, "amount", value.to_decimal())?;
    CurrencyAmount::new(kind.clone(), value).map_err(|e| malformed(tx_hash, &e.to_string()))
}

fn malformed(tx_hash: &str, detail: &str) -> CdpError {
    CdpError::InvariantViolation(format!("malformed event in tx {}: {}", tx_hash, detail))
}
