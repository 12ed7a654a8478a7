//! Public lifecycle operations over a set of ledger collaborators.
//!
//! Every state-changing operation validates and encodes its request before
//! the first remote call, so a rejected request leaves the ledger untouched.
//! Compound operations are not atomic: a failure after the custody transfer
//! leaves the transferred funds in place.

use crate::config::{Config, CurrencyConfig};
use crate::domain::{
    Address, CdpId, CurrencyAmount, Decimal, Ilk, ListOrder, Position, PositionEventRecord, Ray,
    ScaleError, TxReceipt, Urn, Wad,
};
use crate::engine::{ActionDispatcher, EventTranslator, UnitConverter};
use crate::error::CdpError;
use crate::ledger::{EventQuery, LedgerServices, QueryApiClient, RemoteError, UrnIlk};
use crate::orchestration::custody::CustodyAdapter;
use crate::orchestration::registry::PositionRegistry;
use crate::orchestration::tracking::{tracked, TracingObserver, TransactionObserver};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct PositionManager {
    currencies: CurrencyConfig,
    list_order: ListOrder,
    services: LedgerServices,
    registry: PositionRegistry,
    dispatcher: ActionDispatcher,
    custody: CustodyAdapter,
    translator: EventTranslator,
    observer: Arc<dyn TransactionObserver>,
}

impl PositionManager {
    /// Build a manager over `services`. When no event source is supplied and
    /// `config` names a query API, a [`QueryApiClient`] is installed for it.
    pub fn new(config: &Config, mut services: LedgerServices) -> Self {
        if services.events.is_none() {
            if let Some(url) = &config.query_api_url {
                let client: Arc<dyn EventQuery> = Arc::new(QueryApiClient::new(url.clone()));
                services.events = Some(client);
            }
        }

        let currencies = config.currencies.clone();
        let units = UnitConverter::new(currencies.clone(), services.types.clone());
        let dispatcher = ActionDispatcher::new(
            units,
            services.types.clone(),
            services.contracts.clone(),
            services.system.clone(),
            services.proxy_actions.clone(),
        );
        let registry = PositionRegistry::new(services.manager.clone(), services.contracts.clone());
        let custody = CustodyAdapter::new(
            currencies.clone(),
            services.custody.clone(),
            services.token.clone(),
        );
        let translator = EventTranslator::new(currencies.clone(), services.types.clone());

        Self {
            currencies,
            list_order: config.list_order,
            services,
            registry,
            dispatcher,
            custody,
            translator,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default log-based transaction observer.
    pub fn with_observer(mut self, observer: Arc<dyn TransactionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &PositionRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Listing order used when none is requested.
    pub fn default_order(&self) -> ListOrder {
        self.list_order
    }

    pub async fn list_positions(
        &self,
        owner: &Address,
        order: ListOrder,
    ) -> Result<Vec<Position>, CdpError> {
        self.registry.list_positions(owner, order).await
    }

    pub async fn resolve_urn(&self, id: CdpId) -> Result<Urn, CdpError> {
        self.registry.resolve_urn(id).await
    }

    /// Descriptor of an existing position, with its kind read from the ledger.
    pub async fn get_position(&self, id: CdpId) -> Result<Position, CdpError> {
        let raw = self.services.manager.ilk(id).await?;
        let ilk = Ilk::from_bytes32(&raw).map_err(|e| {
            CdpError::InvariantViolation(format!("cdp {} has bad ilk: {}", id, e))
        })?;
        Ok(Position::new(id, ilk))
    }

    /// Open an empty position of kind `ilk`.
    pub async fn open(&self, ilk: &Ilk) -> Result<Position, CdpError> {
        tracked(self.observer.as_ref(), "open", self.open_inner(ilk)).await
    }

    /// Open a position, lock `lock` and draw `draw` in one action.
    ///
    /// With no `ilk`, the kind is inferred from the currency of `lock`.
    pub async fn open_lock_and_draw(
        &self,
        ilk: Option<&Ilk>,
        lock: &CurrencyAmount,
        draw: &CurrencyAmount,
    ) -> Result<Position, CdpError> {
        tracked(
            self.observer.as_ref(),
            "open_lock_and_draw",
            self.open_lock_and_draw_inner(ilk, lock, draw),
        )
        .await
    }

    /// Lock and draw against `id`, or against a new position when `id` is `None`.
    pub async fn lock_and_draw(
        &self,
        id: Option<CdpId>,
        ilk: &Ilk,
        lock: Option<&CurrencyAmount>,
        draw: Option<&CurrencyAmount>,
    ) -> Result<Position, CdpError> {
        tracked(
            self.observer.as_ref(),
            "lock_and_draw",
            self.lock_and_draw_inner(id, ilk, lock, draw),
        )
        .await
    }

    pub async fn lock(
        &self,
        id: CdpId,
        ilk: &Ilk,
        lock: &CurrencyAmount,
    ) -> Result<TxReceipt, CdpError> {
        tracked(self.observer.as_ref(), "lock", self.lock_inner(id, ilk, lock)).await
    }

    /// Repay `wipe` (zero when `None`) and withdraw `free`.
    pub async fn wipe_and_free(
        &self,
        id: CdpId,
        ilk: &Ilk,
        wipe: Option<&CurrencyAmount>,
        free: &CurrencyAmount,
    ) -> Result<TxReceipt, CdpError> {
        tracked(
            self.observer.as_ref(),
            "wipe_and_free",
            self.wipe_and_free_inner(id, ilk, wipe, free),
        )
        .await
    }

    pub async fn wipe(&self, id: CdpId, wipe: &CurrencyAmount) -> Result<TxReceipt, CdpError> {
        tracked(self.observer.as_ref(), "wipe", self.wipe_inner(id, wipe)).await
    }

    /// History of every position owned by `owner`, in event source order.
    pub async fn combined_event_history(
        &self,
        owner: &Address,
    ) -> Result<Vec<PositionEventRecord>, CdpError> {
        let events = self
            .services
            .events
            .clone()
            .ok_or_else(|| RemoteError::Unavailable("event query service".to_string()))?;

        let positions = self.list_positions(owner, self.list_order).await?;
        let targets = try_join_all(positions.into_iter().map(|p| async move {
            let urn = self.registry.resolve_urn(p.id).await?;
            Ok::<_, CdpError>(UrnIlk { urn, ilk: p.ilk })
        }))
        .await?;
        debug!(owner = %owner, targets = targets.len(), "querying event history");

        let raw = events.cdp_events(&targets).await?;
        self.translator.translate(&raw)
    }

    /// Sum of the current debt of every position owned by `owner`.
    pub async fn combined_debt_value(&self, owner: &Address) -> Result<CurrencyAmount, CdpError> {
        let positions = self.list_positions(owner, self.list_order).await?;
        let debts = try_join_all(positions.iter().map(|p| self.debt_value(p))).await?;
        let total = debts
            .into_iter()
            .try_fold(Decimal::zero(), |acc, debt| {
                acc.inner().checked_add(debt.inner()).map(Decimal::from)
            })
            .ok_or_else(|| CdpError::InvariantViolation(format!("debt of {} overflows", owner)))?;
        CurrencyAmount::new(self.currencies.debt.clone(), total)
    }

    /// Drop every cached listing and storage pointer.
    pub fn reset(&self) {
        self.registry.reset();
    }

    async fn open_inner(&self, ilk: &Ilk) -> Result<Position, CdpError> {
        let call = self.dispatcher.open(ilk)?;
        self.services.proxy.ensure_proxy().await?;
        let receipt = self.dispatcher.issue(&call).await?;
        created_position(&receipt, ilk)
    }

    async fn open_lock_and_draw_inner(
        &self,
        ilk: Option<&Ilk>,
        lock: &CurrencyAmount,
        draw: &CurrencyAmount,
    ) -> Result<Position, CdpError> {
        let cdp_type = self.dispatcher.infer_cdp_type(ilk, lock)?;
        self.lock_and_draw_inner(None, &cdp_type.ilk, Some(lock), Some(draw))
            .await
    }

    async fn lock_and_draw_inner(
        &self,
        id: Option<CdpId>,
        ilk: &Ilk,
        lock: Option<&CurrencyAmount>,
        draw: Option<&CurrencyAmount>,
    ) -> Result<Position, CdpError> {
        let call = self.dispatcher.lock_and_draw(id, ilk, lock, draw)?;
        debug!(stage = "validated", method = call.method_name(), "lock-and-draw");

        let proxy = self.services.proxy.ensure_proxy().await?;
        if let Some(lock) = lock {
            self.custody.prepare(lock, &proxy).await?;
        }
        let receipt = self.dispatcher.issue(&call).await?;
        match id {
            Some(id) => Ok(Position::new(id, ilk.clone())),
            None => created_position(&receipt, ilk),
        }
    }

    async fn lock_inner(
        &self,
        id: CdpId,
        ilk: &Ilk,
        lock: &CurrencyAmount,
    ) -> Result<TxReceipt, CdpError> {
        let call = self.dispatcher.lock(id, ilk, lock)?;
        debug!(stage = "validated", method = call.method_name(), cdp = %id, "lock");

        let proxy = self.services.proxy.ensure_proxy().await?;
        self.custody.prepare(lock, &proxy).await?;
        self.dispatcher.issue(&call).await
    }

    async fn wipe_and_free_inner(
        &self,
        id: CdpId,
        ilk: &Ilk,
        wipe: Option<&CurrencyAmount>,
        free: &CurrencyAmount,
    ) -> Result<TxReceipt, CdpError> {
        let call = self.dispatcher.wipe_and_free(id, ilk, wipe, free)?;
        debug!(stage = "validated", method = call.method_name(), cdp = %id, "wipe-and-free");
        self.dispatcher.issue(&call).await
    }

    async fn wipe_inner(&self, id: CdpId, wipe: &CurrencyAmount) -> Result<TxReceipt, CdpError> {
        let call = self.dispatcher.wipe(id, wipe)?;
        debug!(stage = "validated", method = call.method_name(), cdp = %id, "wipe");
        self.dispatcher.issue(&call).await
    }

    async fn debt_value(&self, position: &Position) -> Result<Decimal, CdpError> {
        let urn = self.registry.resolve_urn(position.id).await?;
        let (balances, rate) = futures::try_join!(
            self.services.vat.urn_balances(&position.ilk, &urn),
            self.services.vat.ilk_rate(&position.ilk),
        )?;
        let art = ledger_value(position.id, "art", Wad::parse(&balances.art))?;
        let rate = ledger_value(position.id, "rate", Ray::parse(&rate))?;
        let debt = art.rmul(rate).ok_or_else(|| {
            CdpError::InvariantViolation(format!("debt of cdp {} overflows", position.id))
        })?;
        ledger_value(position.id, "debt", debt.to_decimal())
    }
}

fn created_position(receipt: &TxReceipt, ilk: &Ilk) -> Result<Position, CdpError> {
    let id = receipt.new_cdp_id.ok_or_else(|| {
        CdpError::InvariantViolation(format!("receipt {} names no new cdp", receipt.tx_hash))
    })?;
    Ok(Position::new(id, ilk.clone()))
}

fn ledger_value<T>(id: CdpId, field: &str, parsed: Result<T, ScaleError>) -> Result<T, CdpError> {
    parsed.map_err(|e| {
        CdpError::InvariantViolation(format!("cdp {} has malformed {}: {}", id, field, e))
    })
}
