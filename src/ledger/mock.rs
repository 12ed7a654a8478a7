//! In-memory ledger for testing without network calls.
//!
//! `MockLedger` implements every collaborator trait and records each remote
//! call, in order, so tests can assert both what was sent and what was not.

use super::{
    CdpListing, CdpManagerContract, CdpTypeRegistry, ContractResolver, CustodyJoin, EventQuery,
    JoinAdapterDirectory, LedgerServices, ProxyActions, ProxyService, RemoteError, TokenService,
    UrnBalances, UrnIlk, VatReader,
};
use crate::domain::{
    Address, CdpId, CurrencyAmount, Ilk, ListOrder, RawFrobEvent, TxHash, TxReceipt, Urn,
};
use crate::engine::dispatch::ProxyCall;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const RAY: &str = "1000000000000000000000000000";
const DEFAULT_PROXY: &str = "0x00000000000000000000000000000000000000b0";

/// One recorded remote call. Contract address lookups are local and not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    GetCdps {
        manager: Address,
        owner: Address,
        order: ListOrder,
    },
    Urn(CdpId),
    Ilk(CdpId),
    EnsureProxy,
    Execute(ProxyCall),
    Bag(Address),
    MakeBag(Address),
    Transfer {
        to: Address,
        amount: CurrencyAmount,
    },
    UrnBalances {
        ilk: Ilk,
        urn: Urn,
    },
    IlkRate(Ilk),
    CdpEvents(Vec<UrnIlk>),
}

impl LedgerCall {
    /// Name used to script failures with [`MockLedger::with_failure`].
    pub fn operation(&self) -> &'static str {
        match self {
            LedgerCall::GetCdps { .. } => "get_cdps",
            LedgerCall::Urn(_) => "urn",
            LedgerCall::Ilk(_) => "ilk",
            LedgerCall::EnsureProxy => "ensure_proxy",
            LedgerCall::Execute(_) => "execute",
            LedgerCall::Bag(_) => "bag",
            LedgerCall::MakeBag(_) => "make_bag",
            LedgerCall::Transfer { .. } => "transfer",
            LedgerCall::UrnBalances { .. } => "urn_balances",
            LedgerCall::IlkRate(_) => "ilk_rate",
            LedgerCall::CdpEvents(_) => "cdp_events",
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<LedgerCall>,
    listings: HashMap<Address, CdpListing>,
    urns: HashMap<CdpId, Urn>,
    ilks: HashMap<CdpId, Ilk>,
    bags: HashMap<Address, Address>,
    balances: HashMap<(Ilk, Urn), UrnBalances>,
    rates: HashMap<Ilk, String>,
    events: HashMap<UrnIlk, Vec<RawFrobEvent>>,
    failures: HashMap<&'static str, RemoteError>,
    next_cdp_id: u64,
    tx_count: u64,
}

/// Mock ledger that serves scripted data and records every call.
#[derive(Debug)]
pub struct MockLedger {
    proxy: Address,
    contracts: HashMap<String, Address>,
    missing_contracts: HashSet<String>,
    read_delay: Option<Duration>,
    omit_new_cdp_id: bool,
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Create a new mock ledger with no positions. Opened positions are
    /// numbered from 1.
    pub fn new() -> Self {
        Self {
            proxy: Address::new(DEFAULT_PROXY),
            contracts: HashMap::new(),
            missing_contracts: HashSet::new(),
            read_delay: None,
            omit_new_cdp_id: false,
            state: Mutex::new(MockState {
                next_cdp_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Proxy account returned by `ensure_proxy`.
    pub fn with_proxy(mut self, proxy: Address) -> Self {
        self.proxy = proxy;
        self
    }

    /// Pin a contract name to an address instead of the derived default.
    pub fn with_contract(mut self, name: &str, address: Address) -> Self {
        self.contracts.insert(name.to_string(), address);
        self
    }

    /// Make a contract name unresolvable.
    pub fn without_contract(mut self, name: &str) -> Self {
        self.missing_contracts.insert(name.to_string());
        self
    }

    /// Delay applied to every read before it answers.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Id assigned to the next position created by `execute`.
    pub fn with_next_cdp_id(mut self, id: u64) -> Self {
        self.state_mut().next_cdp_id = id;
        self
    }

    /// Return creating receipts without a new position id.
    pub fn without_new_cdp_ids(mut self) -> Self {
        self.omit_new_cdp_id = true;
        self
    }

    pub fn with_listing(mut self, owner: Address, listing: CdpListing) -> Self {
        self.state_mut().listings.insert(owner, listing);
        self
    }

    pub fn with_urn(mut self, id: CdpId, urn: Urn) -> Self {
        self.state_mut().urns.insert(id, urn);
        self
    }

    pub fn with_ilk(mut self, id: CdpId, ilk: Ilk) -> Self {
        self.state_mut().ilks.insert(id, ilk);
        self
    }

    pub fn with_bag(mut self, proxy: Address, bag: Address) -> Self {
        self.state_mut().bags.insert(proxy, bag);
        self
    }

    pub fn with_balances(mut self, ilk: Ilk, urn: Urn, balances: UrnBalances) -> Self {
        self.state_mut().balances.insert((ilk, urn), balances);
        self
    }

    /// Accrual rate of `ilk`; unset kinds answer with exactly one.
    pub fn with_rate(mut self, ilk: Ilk, rate: &str) -> Self {
        self.state_mut().rates.insert(ilk, rate.to_string());
        self
    }

    pub fn with_events(mut self, target: UrnIlk, events: Vec<RawFrobEvent>) -> Self {
        self.state_mut().events.entry(target).or_default().extend(events);
        self
    }

    /// Fail every call of `operation` (see [`LedgerCall::operation`]) with `err`.
    pub fn with_failure(mut self, operation: &'static str, err: RemoteError) -> Self {
        self.state_mut().failures.insert(operation, err);
        self
    }

    pub fn set_urn(&self, id: CdpId, urn: Urn) {
        self.state().urns.insert(id, urn);
    }

    pub fn set_listing(&self, owner: Address, listing: CdpListing) {
        self.state().listings.insert(owner, listing);
    }

    /// Every recorded call, oldest first.
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.state().calls.clone()
    }

    /// Recorded calls of one operation.
    pub fn count(&self, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Proxy calls sent through `execute`, oldest first.
    pub fn executed(&self) -> Vec<ProxyCall> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                LedgerCall::Execute(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn proxy(&self) -> &Address {
        &self.proxy
    }

    /// Address `contract_address` answers for `name`.
    ///
    /// Unpinned names map to the hex of the name itself, padded to 20 bytes.
    pub fn address_of(&self, name: &str) -> Address {
        if let Some(address) = self.contracts.get(name) {
            return address.clone();
        }
        let encoded: String = format!("{:0<40}", hex::encode(name)).chars().take(40).collect();
        Address::new(format!("0x{}", encoded))
    }

    /// Collaborator bundle backed entirely by this ledger.
    pub fn services(self: &Arc<Self>, types: Arc<dyn CdpTypeRegistry>) -> LedgerServices {
        LedgerServices {
            contracts: self.clone(),
            system: Arc::new(JoinAdapterDirectory::new(self.clone())),
            types,
            manager: self.clone(),
            proxy_actions: self.clone(),
            proxy: self.clone(),
            token: self.clone(),
            custody: self.clone(),
            vat: self.clone(),
            events: Some(self.clone()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut MockState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `call` and return the scripted failure for its operation, if any.
    fn record(&self, call: LedgerCall) -> Result<(), RemoteError> {
        let mut state = self.state();
        let failure = state.failures.get(call.operation()).cloned();
        state.calls.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn read_delay(&self) {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn next_receipt(&self) -> TxReceipt {
        let mut state = self.state();
        state.tx_count += 1;
        TxReceipt::new(TxHash::new(format!("0x{:064x}", state.tx_count)))
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractResolver for MockLedger {
    fn contract_address(&self, name: &str) -> Result<Address, RemoteError> {
        if self.missing_contracts.contains(name) {
            return Err(RemoteError::Unavailable(name.to_string()));
        }
        Ok(self.address_of(name))
    }
}

#[async_trait]
impl CdpManagerContract for MockLedger {
    async fn get_cdps(
        &self,
        manager: &Address,
        owner: &Address,
        order: ListOrder,
    ) -> Result<CdpListing, RemoteError> {
        self.record(LedgerCall::GetCdps {
            manager: manager.clone(),
            owner: owner.clone(),
            order,
        })?;
        self.read_delay().await;
        Ok(self
            .state()
            .listings
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn urn(&self, id: CdpId) -> Result<Urn, RemoteError> {
        self.record(LedgerCall::Urn(id))?;
        self.read_delay().await;
        self.state()
            .urns
            .get(&id)
            .cloned()
            .ok_or_else(|| RemoteError::Reverted {
                reason: format!("no urn for cdp {}", id),
            })
    }

    async fn ilk(&self, id: CdpId) -> Result<String, RemoteError> {
        self.record(LedgerCall::Ilk(id))?;
        self.read_delay().await;
        let ilk = self.state().ilks.get(&id).cloned().unwrap_or_else(|| Ilk::new(""));
        ilk.to_bytes32()
            .map_err(|e| RemoteError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ProxyActions for MockLedger {
    async fn execute(&self, call: &ProxyCall) -> Result<TxReceipt, RemoteError> {
        self.record(LedgerCall::Execute(call.clone()))?;
        let receipt = self.next_receipt();
        if !call.action.creates_position() || self.omit_new_cdp_id {
            return Ok(receipt);
        }
        let mut state = self.state();
        let id = CdpId::new(state.next_cdp_id);
        state.next_cdp_id += 1;
        Ok(receipt.with_new_cdp(id))
    }
}

#[async_trait]
impl ProxyService for MockLedger {
    async fn ensure_proxy(&self) -> Result<Address, RemoteError> {
        self.record(LedgerCall::EnsureProxy)?;
        Ok(self.proxy.clone())
    }
}

#[async_trait]
impl TokenService for MockLedger {
    async fn transfer(
        &self,
        to: &Address,
        amount: &CurrencyAmount,
    ) -> Result<TxReceipt, RemoteError> {
        self.record(LedgerCall::Transfer {
            to: to.clone(),
            amount: amount.clone(),
        })?;
        Ok(self.next_receipt())
    }
}

#[async_trait]
impl CustodyJoin for MockLedger {
    async fn bag(&self, proxy: &Address) -> Result<Address, RemoteError> {
        self.record(LedgerCall::Bag(proxy.clone()))?;
        self.read_delay().await;
        Ok(self
            .state()
            .bags
            .get(proxy)
            .cloned()
            .unwrap_or_else(|| Address::new("0x0000000000000000000000000000000000000000")))
    }

    async fn make_bag(&self, proxy: &Address) -> Result<TxReceipt, RemoteError> {
        self.record(LedgerCall::MakeBag(proxy.clone()))?;
        let receipt = self.next_receipt();
        let mut state = self.state();
        let bag = Address::new(format!("0xba9{:037x}", state.bags.len() + 1));
        state.bags.entry(proxy.clone()).or_insert(bag);
        Ok(receipt)
    }
}

#[async_trait]
impl VatReader for MockLedger {
    async fn urn_balances(&self, ilk: &Ilk, urn: &Urn) -> Result<UrnBalances, RemoteError> {
        self.record(LedgerCall::UrnBalances {
            ilk: ilk.clone(),
            urn: urn.clone(),
        })?;
        self.read_delay().await;
        Ok(self
            .state()
            .balances
            .get(&(ilk.clone(), urn.clone()))
            .cloned()
            .unwrap_or_else(|| UrnBalances {
                ink: "0".to_string(),
                art: "0".to_string(),
            }))
    }

    async fn ilk_rate(&self, ilk: &Ilk) -> Result<String, RemoteError> {
        self.record(LedgerCall::IlkRate(ilk.clone()))?;
        self.read_delay().await;
        Ok(self
            .state()
            .rates
            .get(ilk)
            .cloned()
            .unwrap_or_else(|| RAY.to_string()))
    }
}

#[async_trait]
impl EventQuery for MockLedger {
    async fn cdp_events(&self, targets: &[UrnIlk]) -> Result<Vec<RawFrobEvent>, RemoteError> {
        self.record(LedgerCall::CdpEvents(targets.to_vec()))?;
        self.read_delay().await;
        let state = self.state();
        Ok(targets
            .iter()
            .filter_map(|t| state.events.get(t))
            .flatten()
            .cloned()
            .collect())
    }
}
