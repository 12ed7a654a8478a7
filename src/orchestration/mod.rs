//! Request-level orchestration: caches, custody pre-deposits, transaction
//! tracking and the public façade.

pub mod custody;
pub mod manager;
pub mod registry;
pub mod tracking;

pub use custody::CustodyAdapter;
pub use manager::PositionManager;
pub use registry::PositionRegistry;
pub use tracking::{tracked, OperationId, TracingObserver, TransactionObserver};
