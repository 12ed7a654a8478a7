//! Raw ledger history entries and the structured records derived from them.

use crate::domain::{Address, CurrencyAmount, Ilk, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One state-changing call against a position, as returned by the event indexer.
///
/// Integer fields are kept as the indexer's decimal strings; interpretation
/// happens in the event translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFrobEvent {
    pub ilk_identifier: String,
    /// Signed collateral delta in 18-decimal ledger units.
    pub dink: String,
    /// Signed debt delta in stored (pre-accrual) debt units.
    pub dart: String,
    pub ilk: RawIlkState,
    pub tx: RawTx,
    pub urn: RawUrnSnapshot,
}

/// Accrual rate of the kind at the time of the event, 27-decimal fixed point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIlkState {
    pub rate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTx {
    pub transaction_hash: String,
    pub tx_from: String,
    pub era: RawEra,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEra {
    pub iso: String,
}

/// Post-event balances of the storage pointer. The first node is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUrnSnapshot {
    pub nodes: Vec<RawUrnState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUrnState {
    pub art: String,
    pub ink: String,
}

/// Collateral movement implied by the sign of the collateral delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollateralAction {
    Lock,
    Free,
}

/// Debt movement implied by the sign of the debt delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtAction {
    Draw,
    Wipe,
}

/// A position change reconstructed from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEventRecord {
    pub transaction_hash: TxHash,
    pub ilk: Ilk,
    pub time: DateTime<Utc>,
    pub sender_address: Address,
    /// Magnitude of the collateral delta.
    pub change_in_collateral: CurrencyAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collateral_action: Option<CollateralAction>,
    /// Magnitude of the debt delta, scaled by the accrual rate at event time.
    pub change_in_debt: CurrencyAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_action: Option<DebtAction>,
    pub resulting_collateral: CurrencyAmount,
    /// Stored debt units after the event (not rate-scaled).
    pub resulting_debt: CurrencyAmount,
}
