pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod orchestration;

pub use config::{Config, CurrencyConfig};
pub use domain::{
    Address, CdpId, CdpType, CurrencyAmount, CurrencyKind, Decimal, Ilk, ListOrder, Position,
    PositionEventRecord, TxReceipt, Urn,
};
pub use error::CdpError;
pub use ledger::{LedgerServices, MockLedger, RemoteError};
pub use orchestration::{PositionManager, PositionRegistry, TransactionObserver};
