//! Domain types for the position manager.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper, with base-unit scaling
//! - WAD/RAY newtypes over `U256` for the ledger's fixed-point integers
//! - Domain primitives: Address, CdpId, Ilk, Urn, TxHash
//! - Tagged currency amounts and collateral kind descriptors
//! - Raw ledger history entries and the records reconstructed from them

pub mod cdp_type;
pub mod currency;
pub mod decimal;
pub mod event;
pub mod fixed_point;
pub mod position;
pub mod primitives;

pub use cdp_type::CdpType;
pub use currency::{CurrencyAmount, CurrencyKind};
pub use decimal::{Decimal, ScaleError};
pub use event::{
    CollateralAction, DebtAction, PositionEventRecord, RawEra, RawFrobEvent, RawIlkState, RawTx,
    RawUrnSnapshot, RawUrnState,
};
pub use fixed_point::{Ray, Wad, WadDelta};
pub use position::{ListOrder, Position, TxReceipt};
pub use primitives::{Address, CdpId, Ilk, IlkParseError, TxHash, Urn};
