//! Collaborator interfaces for the remote ledger and its surrounding services.
//!
//! The core never talks to a chain directly; every read and state-changing
//! call goes through one of these traits. Implementations own transport,
//! signing and retry policy.

use crate::domain::{
    Address, CdpId, CdpType, CurrencyAmount, CurrencyKind, Ilk, ListOrder, RawFrobEvent,
    TxReceipt, Urn,
};
use crate::engine::dispatch::ProxyCall;
use crate::error::CdpError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub mod mock;
pub mod query_api;

pub use mock::{LedgerCall, MockLedger};
pub use query_api::QueryApiClient;

/// Contract names the core resolves.
pub mod contracts {
    pub const CDP_MANAGER: &str = "CDP_MANAGER";
    pub const GET_CDPS: &str = "GET_CDPS";
    pub const MCD_JUG: &str = "MCD_JUG";
    pub const PROXY_ACTIONS: &str = "PROXY_ACTIONS";
    pub const JOIN_PREFIX: &str = "MCD_JOIN_";
}

/// Resolves deployed contract addresses by name for the active network.
pub trait ContractResolver: Send + Sync + fmt::Debug {
    fn contract_address(&self, name: &str) -> Result<Address, RemoteError>;
}

/// System-state lookups.
pub trait SystemData: Send + Sync + fmt::Debug {
    /// Address of the join adapter for a collateral kind (or the debt token).
    fn adapter_address(&self, ilk: &Ilk) -> Result<Address, RemoteError>;
}

/// Join adapters registered as `MCD_JOIN_<ILK>` with dashes as underscores.
#[derive(Debug, Clone)]
pub struct JoinAdapterDirectory {
    resolver: Arc<dyn ContractResolver>,
}

impl JoinAdapterDirectory {
    pub fn new(resolver: Arc<dyn ContractResolver>) -> Self {
        Self { resolver }
    }

    pub fn contract_name(ilk: &Ilk) -> String {
        format!("{}{}", contracts::JOIN_PREFIX, ilk.as_str().replace('-', "_"))
    }
}

impl SystemData for JoinAdapterDirectory {
    fn adapter_address(&self, ilk: &Ilk) -> Result<Address, RemoteError> {
        self.resolver.contract_address(&Self::contract_name(ilk))
    }
}

/// Registered collateral kinds.
pub trait CdpTypeRegistry: Send + Sync + fmt::Debug {
    fn cdp_types(&self) -> &[CdpType];

    /// The single kind matching every supplied filter.
    ///
    /// # Errors
    /// `PreconditionFailed` when more than one kind matches, `InvalidArgument`
    /// when none does.
    fn cdp_type(
        &self,
        currency: Option<&CurrencyKind>,
        ilk: Option<&Ilk>,
    ) -> Result<CdpType, CdpError> {
        let matches: Vec<&CdpType> = self
            .cdp_types()
            .iter()
            .filter(|t| currency.map_or(true, |c| &t.currency == c))
            .filter(|t| ilk.map_or(true, |i| &t.ilk == i))
            .collect();

        let label = match (currency, ilk) {
            (Some(c), Some(i)) => format!("currency {}, ilk {}", c, i),
            (Some(c), None) => format!("currency {}", c),
            (None, Some(i)) => format!("ilk {}", i),
            (None, None) => "empty filter".to_string(),
        };

        match matches.as_slice() {
            [only] => Ok((*only).clone()),
            [] => Err(CdpError::InvalidArgument(format!(
                "{} matches no cdp type",
                label
            ))),
            _ => Err(CdpError::PreconditionFailed(format!(
                "{} matches more than one cdp type",
                label
            ))),
        }
    }
}

/// Fixed list of collateral kinds.
#[derive(Debug, Clone, Default)]
pub struct StaticCdpTypes {
    types: Vec<CdpType>,
}

impl StaticCdpTypes {
    pub fn new(types: Vec<CdpType>) -> Self {
        Self { types }
    }
}

impl CdpTypeRegistry for StaticCdpTypes {
    fn cdp_types(&self) -> &[CdpType] {
        &self.types
    }
}

/// Raw listing as returned by the position-listing contract.
///
/// `ilks` are bytes32 hex values. The three vectors are expected to be
/// parallel; the core checks that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CdpListing {
    pub ids: Vec<u64>,
    pub urns: Vec<Urn>,
    pub ilks: Vec<String>,
}

/// Read surface of the on-chain position manager.
#[async_trait]
pub trait CdpManagerContract: Send + Sync + fmt::Debug {
    async fn get_cdps(
        &self,
        manager: &Address,
        owner: &Address,
        order: ListOrder,
    ) -> Result<CdpListing, RemoteError>;

    async fn urn(&self, id: CdpId) -> Result<Urn, RemoteError>;

    /// bytes32 hex ilk of a position.
    async fn ilk(&self, id: CdpId) -> Result<String, RemoteError>;
}

/// Executes proxy actions through the owner's proxy account.
#[async_trait]
pub trait ProxyActions: Send + Sync + fmt::Debug {
    async fn execute(&self, call: &ProxyCall) -> Result<TxReceipt, RemoteError>;
}

/// Proxy account lifecycle. `ensure_proxy` is idempotent.
#[async_trait]
pub trait ProxyService: Send + Sync + fmt::Debug {
    async fn ensure_proxy(&self) -> Result<Address, RemoteError>;
}

/// ERC-20 style transfers from the signing account.
#[async_trait]
pub trait TokenService: Send + Sync + fmt::Debug {
    async fn transfer(&self, to: &Address, amount: &CurrencyAmount)
        -> Result<TxReceipt, RemoteError>;
}

/// Join adapter of the custody-only collateral kind, which keeps one holding
/// account ("bag") per proxy.
#[async_trait]
pub trait CustodyJoin: Send + Sync + fmt::Debug {
    /// The proxy's bag, or the zero address when none exists.
    async fn bag(&self, proxy: &Address) -> Result<Address, RemoteError>;

    /// Create the proxy's bag. The receipt does not carry its address.
    async fn make_bag(&self, proxy: &Address) -> Result<TxReceipt, RemoteError>;
}

/// Raw balances of a storage pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrnBalances {
    pub ink: String,
    pub art: String,
}

/// Read surface of the core accounting contract.
#[async_trait]
pub trait VatReader: Send + Sync + fmt::Debug {
    async fn urn_balances(&self, ilk: &Ilk, urn: &Urn) -> Result<UrnBalances, RemoteError>;

    /// Accrual rate of a kind, 27-decimal fixed point.
    async fn ilk_rate(&self, ilk: &Ilk) -> Result<String, RemoteError>;
}

/// A storage pointer together with its collateral kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrnIlk {
    pub urn: Urn,
    pub ilk: Ilk,
}

/// Historical position events.
#[async_trait]
pub trait EventQuery: Send + Sync + fmt::Debug {
    async fn cdp_events(&self, targets: &[UrnIlk]) -> Result<Vec<RawFrobEvent>, RemoteError>;
}

/// Every collaborator the position manager needs, bundled for construction.
///
/// `events` is `None` when no history indexer is configured; history queries
/// then fail with `RemoteError::Unavailable`.
#[derive(Debug, Clone)]
pub struct LedgerServices {
    pub contracts: Arc<dyn ContractResolver>,
    pub system: Arc<dyn SystemData>,
    pub types: Arc<dyn CdpTypeRegistry>,
    pub manager: Arc<dyn CdpManagerContract>,
    pub proxy_actions: Arc<dyn ProxyActions>,
    pub proxy: Arc<dyn ProxyService>,
    pub token: Arc<dyn TokenService>,
    pub custody: Arc<dyn CustodyJoin>,
    pub vat: Arc<dyn VatReader>,
    pub events: Option<Arc<dyn EventQuery>>,
}

/// Error type for collaborator calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// The contract call reverted.
    Reverted { reason: String },
    /// A contract or service is not available on this network.
    Unavailable(String),
    /// Other error
    Other(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            RemoteError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            RemoteError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            RemoteError::RateLimited => write!(f, "Rate limited"),
            RemoteError::Reverted { reason } => write!(f, "Reverted: {}", reason),
            RemoteError::Unavailable(name) => write!(f, "Unavailable: {}", name),
            RemoteError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}
