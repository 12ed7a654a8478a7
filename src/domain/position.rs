//! Position descriptors and listing order.

use crate::domain::{CdpId, Ilk, TxHash};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A position: numeric id plus its immutable collateral kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub id: CdpId,
    pub ilk: Ilk,
}

impl Position {
    pub fn new(id: CdpId, ilk: Ilk) -> Self {
        Self { id, ilk }
    }
}

/// Ordering of an owner's position listing, by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOrder {
    Ascending,
    #[default]
    Descending,
}

impl ListOrder {
    /// Sort `positions` in place by id.
    pub fn apply(&self, positions: &mut [Position]) {
        match self {
            ListOrder::Ascending => positions.sort_by_key(|p| p.id),
            ListOrder::Descending => positions.sort_by(|a, b| b.id.cmp(&a.id)),
        }
    }
}

impl FromStr for ListOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(ListOrder::Ascending),
            "desc" | "descending" => Ok(ListOrder::Descending),
            _ => Err(()),
        }
    }
}

/// Outcome of a state-changing remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    /// Id of the position created by this transaction, if any.
    pub new_cdp_id: Option<CdpId>,
}

impl TxReceipt {
    pub fn new(tx_hash: TxHash) -> Self {
        Self {
            tx_hash,
            new_cdp_id: None,
        }
    }

    pub fn with_new_cdp(mut self, id: CdpId) -> Self {
        self.new_cdp_id = Some(id);
        self
    }
}
