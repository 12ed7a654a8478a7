//! Pure computation for the position lifecycle: unit encoding, action
//! selection and history reconstruction.

pub mod dispatch;
pub mod event_translator;
pub mod units;

pub use dispatch::{ActionDispatcher, CallArg, CallOptions, LockDrawKind, ProxyAction, ProxyCall};
pub use event_translator::EventTranslator;
pub use units::{Precision, UnitConverter, WireAmount};
