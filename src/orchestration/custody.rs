//! Pre-deposit for collateral the proxy-actions contract cannot pull itself.
//!
//! Such a token is transferred by the owner into a per-proxy holding account
//! ("bag") before the lock. The bag is created on first use.

use crate::config::CurrencyConfig;
use crate::domain::{Address, CurrencyAmount};
use crate::error::CdpError;
use crate::ledger::{CustodyJoin, TokenService};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CustodyAdapter {
    currencies: CurrencyConfig,
    join: Arc<dyn CustodyJoin>,
    token: Arc<dyn TokenService>,
}

impl CustodyAdapter {
    pub fn new(
        currencies: CurrencyConfig,
        join: Arc<dyn CustodyJoin>,
        token: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            currencies,
            join,
            token,
        }
    }

    pub fn applies_to(&self, amount: &CurrencyAmount) -> bool {
        self.currencies.requires_custody(amount.kind())
    }

    /// Move `amount` into the bag of `proxy`, creating the bag if needed.
    ///
    /// Does nothing for any other collateral kind. Returns the bag used.
    pub async fn prepare(
        &self,
        amount: &CurrencyAmount,
        proxy: &Address,
    ) -> Result<Option<Address>, CdpError> {
        if !self.applies_to(amount) {
            return Ok(None);
        }
        let bag = self.ensure_bag(proxy).await?;
        info!(proxy = %proxy, bag = %bag, amount = %amount, "transferring collateral to bag");
        self.token.transfer(&bag, amount).await?;
        Ok(Some(bag))
    }

    async fn ensure_bag(&self, proxy: &Address) -> Result<Address, CdpError> {
        let bag = self.join.bag(proxy).await?;
        if !bag.is_zero() {
            return Ok(bag);
        }
        debug!(proxy = %proxy, "no bag yet, creating one");
        self.join.make_bag(proxy).await?;
        let bag = self.join.bag(proxy).await?;
        if bag.is_zero() {
            return Err(CdpError::InvariantViolation(format!(
                "bag for {} still unset after creation",
                proxy
            )));
        }
        Ok(bag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurrencyKind, Decimal};
    use crate::ledger::{LedgerCall, MockLedger, RemoteError};

    fn adapter(ledger: &Arc<MockLedger>) -> CustodyAdapter {
        CustodyAdapter::new(CurrencyConfig::default(), ledger.clone(), ledger.clone())
    }

    fn gnt(value: u64) -> CurrencyAmount {
        CurrencyKind::new("GNT").amount(Decimal::from(value)).unwrap()
    }

    #[tokio::test]
    async fn test_creates_bag_then_transfers() {
        let ledger = Arc::new(MockLedger::new());
        let proxy = Address::new("0xproxy");

        let bag = adapter(&ledger)
            .prepare(&gnt(5), &proxy)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            ledger.calls(),
            vec![
                LedgerCall::Bag(proxy.clone()),
                LedgerCall::MakeBag(proxy.clone()),
                LedgerCall::Bag(proxy.clone()),
                LedgerCall::Transfer {
                    to: bag,
                    amount: gnt(5)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_bag_is_reused() {
        let proxy = Address::new("0xproxy");
        let bag = Address::new("0x00000000000000000000000000000000000000bb");
        let ledger = Arc::new(MockLedger::new().with_bag(proxy.clone(), bag.clone()));

        adapter(&ledger).prepare(&gnt(1), &proxy).await.unwrap();

        assert_eq!(
            ledger.calls(),
            vec![
                LedgerCall::Bag(proxy),
                LedgerCall::Transfer {
                    to: bag,
                    amount: gnt(1)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_other_collateral_untouched() {
        let ledger = Arc::new(MockLedger::new());
        let bat = CurrencyKind::new("BAT").amount(Decimal::from(3u64)).unwrap();

        let bag = adapter(&ledger)
            .prepare(&bat, &Address::new("0xproxy"))
            .await
            .unwrap();

        assert!(bag.is_none());
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_failure_propagates() {
        let ledger = Arc::new(MockLedger::new().with_failure(
            "transfer",
            RemoteError::Reverted {
                reason: "insufficient balance".to_string(),
            },
        ));

        let err = adapter(&ledger)
            .prepare(&gnt(5), &Address::new("0xproxy"))
            .await
            .unwrap_err();
        assert!(matches!(err, CdpError::Remote(RemoteError::Reverted { .. })));
    }
}
