//! Per-owner position listing and per-position storage pointer caches.
//!
//! Both caches are in-flight tables: the first request for a key starts the
//! remote fetch and stores its shared handle; every later request for the
//! same key awaits that handle instead of fetching again. Entries, failed
//! ones included, live until `reset()`.

use crate::domain::{Address, CdpId, Ilk, ListOrder, Position, Urn};
use crate::error::CdpError;
use crate::ledger::{contracts, CdpManagerContract, ContractResolver};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, CdpError>>>;

#[derive(Default)]
struct Tables {
    positions: HashMap<Address, SharedFetch<Arc<Vec<Position>>>>,
    urns: HashMap<CdpId, SharedFetch<Urn>>,
}

fn positions_table(tables: &mut Tables) -> &mut HashMap<Address, SharedFetch<Arc<Vec<Position>>>> {
    &mut tables.positions
}

fn urns_table(tables: &mut Tables) -> &mut HashMap<CdpId, SharedFetch<Urn>> {
    &mut tables.urns
}

pub struct PositionRegistry {
    contract: Arc<dyn CdpManagerContract>,
    contracts: Arc<dyn ContractResolver>,
    tables: Mutex<Tables>,
}

impl std::fmt::Debug for PositionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.lock();
        f.debug_struct("PositionRegistry")
            .field("owners", &tables.positions.len())
            .field("urns", &tables.urns.len())
            .finish()
    }
}

impl PositionRegistry {
    pub fn new(
        contract: Arc<dyn CdpManagerContract>,
        contracts: Arc<dyn ContractResolver>,
    ) -> Self {
        Self {
            contract,
            contracts,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Positions owned by `owner` (a proxy account), sorted by id per `order`.
    ///
    /// # Errors
    /// `InvariantViolation` if the remote id and ilk lists differ in length or
    /// an ilk cannot be decoded.
    pub async fn list_positions(
        &self,
        owner: &Address,
        order: ListOrder,
    ) -> Result<Vec<Position>, CdpError> {
        let listing = self
            .join_or_start(positions_table, owner.clone(), || {
                self.fetch_positions(owner.clone(), order)
            })
            .await?;
        let mut positions = listing.as_ref().clone();
        order.apply(&mut positions);
        Ok(positions)
    }

    /// Storage pointer of a position.
    pub async fn resolve_urn(&self, id: CdpId) -> Result<Urn, CdpError> {
        self.join_or_start(urns_table, id, || self.fetch_urn(id)).await
    }

    /// Drop every cached and in-flight entry. Requests already awaiting an
    /// entry still receive its result.
    pub fn reset(&self) {
        let mut tables = self.lock();
        debug!(
            owners = tables.positions.len(),
            urns = tables.urns.len(),
            "resetting position registry"
        );
        *tables = Tables::default();
    }

    async fn join_or_start<K, T>(
        &self,
        table: fn(&mut Tables) -> &mut HashMap<K, SharedFetch<T>>,
        key: K,
        start: impl FnOnce() -> BoxFuture<'static, Result<T, CdpError>>,
    ) -> Result<T, CdpError>
    where
        K: Eq + Hash + std::fmt::Debug,
        T: Clone,
    {
        let fetch = {
            let mut tables = self.lock();
            let fetch = match table(&mut tables).entry(key) {
                Entry::Occupied(entry) => {
                    debug!(key = ?entry.key(), "joining cached fetch");
                    entry.get().clone()
                }
                Entry::Vacant(entry) => {
                    debug!(key = ?entry.key(), "starting fetch");
                    entry.insert(start().shared()).clone()
                }
            };
            fetch
        };
        fetch.await
    }

    fn fetch_positions(
        &self,
        owner: Address,
        order: ListOrder,
    ) -> BoxFuture<'static, Result<Arc<Vec<Position>>, CdpError>> {
        let contract = self.contract.clone();
        let manager = self.contracts.contract_address(contracts::CDP_MANAGER);
        async move {
            let manager = manager?;
            let listing = contract.get_cdps(&manager, &owner, order).await?;
            if listing.ids.len() != listing.ilks.len() {
                return Err(CdpError::InvariantViolation(format!(
                    "ids and ilks must be the same length, got {} ids and {} ilks for {}",
                    listing.ids.len(),
                    listing.ilks.len(),
                    owner
                )));
            }
            let positions = listing
                .ids
                .iter()
                .zip(listing.ilks.iter())
                .map(|(id, raw)| {
                    let ilk = Ilk::from_bytes32(raw).map_err(|e| {
                        CdpError::InvariantViolation(format!("cdp {} has bad ilk: {}", id, e))
                    })?;
                    Ok(Position::new(CdpId::new(*id), ilk))
                })
                .collect::<Result<Vec<_>, CdpError>>()?;
            debug!(owner = %owner, count = positions.len(), "fetched positions");
            Ok(Arc::new(positions))
        }
        .boxed()
    }

    fn fetch_urn(&self, id: CdpId) -> BoxFuture<'static, Result<Urn, CdpError>> {
        let contract = self.contract.clone();
        async move { Ok(contract.urn(id).await?) }.boxed()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CdpListing, LedgerCall, MockLedger};
    use std::time::Duration;

    fn owner() -> Address {
        Address::new("0x00000000000000000000000000000000000000p1")
    }

    fn ilk_hex(ilk: &str) -> String {
        Ilk::new(ilk).to_bytes32().unwrap()
    }

    fn ledger() -> Arc<MockLedger> {
        let ledger = MockLedger::new().with_listing(
            owner(),
            CdpListing {
                ids: vec![3, 1, 2],
                urns: vec![Urn::new("0xu3"), Urn::new("0xu1"), Urn::new("0xu2")],
                ilks: vec![ilk_hex("ETH-A"), ilk_hex("BAT-A"), ilk_hex("ETH-A")],
            },
        );
        Arc::new(ledger)
    }

    fn registry(ledger: &Arc<MockLedger>) -> PositionRegistry {
        PositionRegistry::new(ledger.clone(), ledger.clone())
    }

    fn get_cdps_calls(ledger: &MockLedger) -> usize {
        ledger.count("get_cdps")
    }

    #[tokio::test]
    async fn test_list_positions_sorted_by_order() {
        let ledger = ledger();
        let registry = registry(&ledger);

        let desc = registry
            .list_positions(&owner(), ListOrder::Descending)
            .await
            .unwrap();
        let ids: Vec<u64> = desc.iter().map(|p| p.id.as_u64()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(desc[2].ilk, Ilk::new("BAT-A"));

        let asc = registry
            .list_positions(&owner(), ListOrder::Ascending)
            .await
            .unwrap();
        let ids: Vec<u64> = asc.iter().map(|p| p.id.as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(get_cdps_calls(&ledger), 1);
    }

    #[tokio::test]
    async fn test_concurrent_listing_issues_one_fetch() {
        let ledger = Arc::new(
            MockLedger::new()
                .with_listing(
                    owner(),
                    CdpListing {
                        ids: vec![1],
                        urns: vec![Urn::new("0xu1")],
                        ilks: vec![ilk_hex("ETH-A")],
                    },
                )
                .with_read_delay(Duration::from_millis(20)),
        );
        let registry = registry(&ledger);

        let owner = owner();
        let (a, b) = tokio::join!(
            registry.list_positions(&owner, ListOrder::Descending),
            registry.list_positions(&owner, ListOrder::Descending)
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(get_cdps_calls(&ledger), 1);
    }

    #[tokio::test]
    async fn test_mismatched_lengths_is_invariant_violation() {
        let ledger = Arc::new(MockLedger::new().with_listing(
            owner(),
            CdpListing {
                ids: vec![1, 2, 3],
                urns: vec![],
                ilks: vec![ilk_hex("ETH-A"), ilk_hex("ETH-A")],
            },
        ));
        let registry = registry(&ledger);

        let err = registry
            .list_positions(&owner(), ListOrder::Descending)
            .await
            .unwrap_err();
        assert!(matches!(err, CdpError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_kept_until_reset() {
        let ledger = Arc::new(MockLedger::new().with_listing(
            owner(),
            CdpListing {
                ids: vec![1, 2],
                urns: vec![],
                ilks: vec![ilk_hex("ETH-A")],
            },
        ));
        let registry = registry(&ledger);

        let first = registry
            .list_positions(&owner(), ListOrder::Descending)
            .await
            .unwrap_err();
        let second = registry
            .list_positions(&owner(), ListOrder::Ascending)
            .await
            .unwrap_err();
        assert!(matches!(first, CdpError::InvariantViolation(_)));
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(get_cdps_calls(&ledger), 1);

        registry.reset();
        assert!(registry
            .list_positions(&owner(), ListOrder::Descending)
            .await
            .is_err());
        assert_eq!(get_cdps_calls(&ledger), 2);
    }

    #[tokio::test]
    async fn test_failed_urn_lookup_is_kept_until_reset() {
        let ledger = Arc::new(MockLedger::new());
        let registry = registry(&ledger);

        assert!(registry.resolve_urn(CdpId::new(4)).await.is_err());
        ledger.set_urn(CdpId::new(4), Urn::new("0xu4"));
        assert!(registry.resolve_urn(CdpId::new(4)).await.is_err());
        assert_eq!(ledger.count("urn"), 1);

        registry.reset();
        assert_eq!(
            registry.resolve_urn(CdpId::new(4)).await.unwrap(),
            Urn::new("0xu4")
        );
    }

    #[tokio::test]
    async fn test_urn_cached_per_id() {
        let ledger = Arc::new(
            MockLedger::new()
                .with_urn(CdpId::new(1), Urn::new("0xu1"))
                .with_urn(CdpId::new(2), Urn::new("0xu2"))
                .with_read_delay(Duration::from_millis(10)),
        );
        let registry = registry(&ledger);

        let (a, b, c) = tokio::join!(
            registry.resolve_urn(CdpId::new(1)),
            registry.resolve_urn(CdpId::new(1)),
            registry.resolve_urn(CdpId::new(2)),
        );
        assert_eq!(a.unwrap(), Urn::new("0xu1"));
        assert_eq!(b.unwrap(), Urn::new("0xu1"));
        assert_eq!(c.unwrap(), Urn::new("0xu2"));

        let urn_calls = ledger
            .calls()
            .iter()
            .filter(|c| matches!(c, LedgerCall::Urn(_)))
            .count();
        assert_eq!(urn_calls, 2);
    }

    #[tokio::test]
    async fn test_reset_forces_refetch() {
        let ledger = ledger();
        let registry = registry(&ledger);
        ledger.set_urn(CdpId::new(1), Urn::new("0xu1"));

        registry
            .list_positions(&owner(), ListOrder::Descending)
            .await
            .unwrap();
        registry.resolve_urn(CdpId::new(1)).await.unwrap();
        registry.reset();
        registry
            .list_positions(&owner(), ListOrder::Descending)
            .await
            .unwrap();
        registry.resolve_urn(CdpId::new(1)).await.unwrap();

        assert_eq!(get_cdps_calls(&ledger), 2);
        let urn_calls = ledger
            .calls()
            .iter()
            .filter(|c| matches!(c, LedgerCall::Urn(_)))
            .count();
        assert_eq!(urn_calls, 2);
    }
}
