//! Selection and construction of proxy actions.
//!
//! Each lifecycle request maps onto exactly one [`ProxyAction`] variant. The
//! variant carries every argument in wire form; [`ProxyCall::args`] renders
//! them in the order the proxy-actions contract expects.

use crate::domain::{Address, CdpId, CdpType, CurrencyAmount, Ilk, TxReceipt};
use crate::engine::units::{UnitConverter, WireAmount};
use crate::error::CdpError;
use crate::ledger::{contracts, CdpTypeRegistry, ContractResolver, ProxyActions, SystemData};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Combined lock-and-draw shapes, chosen by (existing id, native collateral).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockDrawKind {
    LockNativeAndDraw(CdpId),
    LockTokenAndDraw(CdpId),
    OpenLockNativeAndDraw,
    OpenLockTokenAndDraw,
}

impl LockDrawKind {
    pub fn select(existing_id: Option<CdpId>, is_native: bool) -> Self {
        match (existing_id, is_native) {
            (Some(id), true) => LockDrawKind::LockNativeAndDraw(id),
            (Some(id), false) => LockDrawKind::LockTokenAndDraw(id),
            (None, true) => LockDrawKind::OpenLockNativeAndDraw,
            (None, false) => LockDrawKind::OpenLockTokenAndDraw,
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            LockDrawKind::LockNativeAndDraw(_) => "lockETHAndDraw",
            LockDrawKind::LockTokenAndDraw(_) => "lockGemAndDraw",
            LockDrawKind::OpenLockNativeAndDraw => "openLockETHAndDraw",
            LockDrawKind::OpenLockTokenAndDraw => "openLockGemAndDraw",
        }
    }
}

/// A single positional argument of a proxy action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CallArg {
    Address(Address),
    Uint(WireAmount),
    CdpId(CdpId),
    /// Id rendered by [`CdpId::to_id_bytes`].
    IdBytes(String),
    /// Ilk rendered by [`Ilk::to_bytes32`].
    Bytes32(String),
    Bool(bool),
}

/// Trailing options of every proxy action call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallOptions {
    /// Route through the caller's proxy account.
    pub ds_proxy: bool,
    /// Native value attached to the call.
    pub value: Option<WireAmount>,
}

/// The closed set of proxy actions this crate issues.
///
/// `wad_c` is a collateral amount at the collateral's precision, `wad_d` a
/// debt amount at debt precision. `transfer_from` tells the contract whether
/// it may pull the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProxyAction {
    Open {
        manager: Address,
        ilk: String,
    },
    LockEthAndDraw {
        manager: Address,
        jug: Address,
        eth_join: Address,
        dai_join: Address,
        cdp: CdpId,
        wad_d: WireAmount,
    },
    LockGemAndDraw {
        manager: Address,
        jug: Address,
        gem_join: Address,
        dai_join: Address,
        cdp: CdpId,
        wad_c: WireAmount,
        wad_d: WireAmount,
        transfer_from: bool,
    },
    OpenLockEthAndDraw {
        manager: Address,
        jug: Address,
        eth_join: Address,
        dai_join: Address,
        ilk: String,
        wad_d: WireAmount,
    },
    OpenLockGemAndDraw {
        manager: Address,
        jug: Address,
        gem_join: Address,
        dai_join: Address,
        ilk: String,
        wad_c: WireAmount,
        wad_d: WireAmount,
        transfer_from: bool,
    },
    SafeLockEth {
        manager: Address,
        eth_join: Address,
        cdp: CdpId,
    },
    SafeLockGem {
        manager: Address,
        gem_join: Address,
        cdp: CdpId,
        wad_c: WireAmount,
        transfer_from: bool,
    },
    SafeWipe {
        manager: Address,
        dai_join: Address,
        cdp: String,
        wad_d: WireAmount,
    },
    WipeAndFreeEth {
        manager: Address,
        eth_join: Address,
        dai_join: Address,
        cdp: String,
        wad_c: WireAmount,
        wad_d: WireAmount,
    },
    WipeAndFreeGem {
        manager: Address,
        gem_join: Address,
        dai_join: Address,
        cdp: String,
        wad_c: WireAmount,
        wad_d: WireAmount,
    },
}

impl ProxyAction {
    pub fn method_name(&self) -> &'static str {
        match self {
            ProxyAction::Open { .. } => "open",
            ProxyAction::LockEthAndDraw { .. } => "lockETHAndDraw",
            ProxyAction::LockGemAndDraw { .. } => "lockGemAndDraw",
            ProxyAction::OpenLockEthAndDraw { .. } => "openLockETHAndDraw",
            ProxyAction::OpenLockGemAndDraw { .. } => "openLockGemAndDraw",
            ProxyAction::SafeLockEth { .. } => "safeLockETH",
            ProxyAction::SafeLockGem { .. } => "safeLockGem",
            ProxyAction::SafeWipe { .. } => "safeWipe",
            ProxyAction::WipeAndFreeEth { .. } => "wipeAndFreeETH",
            ProxyAction::WipeAndFreeGem { .. } => "wipeAndFreeGem",
        }
    }

    /// True for actions whose receipt must name a newly created position.
    pub fn creates_position(&self) -> bool {
        matches!(
            self,
            ProxyAction::Open { .. }
                | ProxyAction::OpenLockEthAndDraw { .. }
                | ProxyAction::OpenLockGemAndDraw { .. }
        )
    }

    /// Positional arguments, in contract order. The options follow the last one.
    pub fn args(&self) -> Vec<CallArg> {
        match self.clone() {
            ProxyAction::Open { manager, ilk } => {
                vec![CallArg::Address(manager), CallArg::Bytes32(ilk)]
            }
            ProxyAction::LockEthAndDraw {
                manager,
                jug,
                eth_join,
                dai_join,
                cdp,
                wad_d,
            } => vec![
                CallArg::Address(manager),
                CallArg::Address(jug),
                CallArg::Address(eth_join),
                CallArg::Address(dai_join),
                CallArg::CdpId(cdp),
                CallArg::Uint(wad_d),
            ],
            ProxyAction::LockGemAndDraw {
                manager,
                jug,
                gem_join,
                dai_join,
                cdp,
                wad_c,
                wad_d,
                transfer_from,
            } => vec![
                CallArg::Address(manager),
                CallArg::Address(jug),
                CallArg::Address(gem_join),
                CallArg::Address(dai_join),
                CallArg::CdpId(cdp),
                CallArg::Uint(wad_c),
                CallArg::Uint(wad_d),
                CallArg::Bool(transfer_from),
            ],
            ProxyAction::OpenLockEthAndDraw {
                manager,
                jug,
                eth_join,
                dai_join,
                ilk,
                wad_d,
            } => vec![
                CallArg::Address(manager),
                CallArg::Address(jug),
                CallArg::Address(eth_join),
                CallArg::Address(dai_join),
                CallArg::Bytes32(ilk),
                CallArg::Uint(wad_d),
            ],
            ProxyAction::OpenLockGemAndDraw {
                manager,
                jug,
                gem_join,
                dai_join,
                ilk,
                wad_c,
                wad_d,
                transfer_from,
            } => vec![
                CallArg::Address(manager),
                CallArg::Address(jug),
                CallArg::Address(gem_join),
                CallArg::Address(dai_join),
                CallArg::Bytes32(ilk),
                CallArg::Uint(wad_c),
                CallArg::Uint(wad_d),
                CallArg::Bool(transfer_from),
            ],
            ProxyAction::SafeLockEth {
                manager,
                eth_join,
                cdp,
            } => vec![CallArg::Address(manager), CallArg::Address(eth_join), CallArg::CdpId(cdp)],
            ProxyAction::SafeLockGem {
                manager,
                gem_join,
                cdp,
                wad_c,
                transfer_from,
            } => vec![
                CallArg::Address(manager),
                CallArg::Address(gem_join),
                CallArg::CdpId(cdp),
                CallArg::Uint(wad_c),
                CallArg::Bool(transfer_from),
            ],
            ProxyAction::SafeWipe {
                manager,
                dai_join,
                cdp,
                wad_d,
            } => vec![
                CallArg::Address(manager),
                CallArg::Address(dai_join),
                CallArg::IdBytes(cdp),
                CallArg::Uint(wad_d),
            ],
            ProxyAction::WipeAndFreeEth {
                manager,
                eth_join,
                dai_join,
                cdp,
                wad_c,
                wad_d,
            } => vec![
                CallArg::Address(manager),
                CallArg::Address(eth_join),
                CallArg::Address(dai_join),
                CallArg::IdBytes(cdp),
                CallArg::Uint(wad_c),
                CallArg::Uint(wad_d),
            ],
            ProxyAction::WipeAndFreeGem {
                manager,
                gem_join,
                dai_join,
                cdp,
                wad_c,
                wad_d,
            } => vec![
                CallArg::Address(manager),
                CallArg::Address(gem_join),
                CallArg::Address(dai_join),
                CallArg::IdBytes(cdp),
                CallArg::Uint(wad_c),
                CallArg::Uint(wad_d),
            ],
        }
    }
}

/// A fully built proxy action call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyCall {
    pub action: ProxyAction,
    pub options: CallOptions,
}

impl ProxyCall {
    fn new(action: ProxyAction) -> Self {
        Self {
            action,
            options: CallOptions {
                ds_proxy: true,
                value: None,
            },
        }
    }

    fn with_value(mut self, value: WireAmount) -> Self {
        self.options.value = Some(value);
        self
    }

    pub fn method_name(&self) -> &'static str {
        self.action.method_name()
    }

    pub fn args(&self) -> Vec<CallArg> {
        self.action.args()
    }

    pub fn value(&self) -> Option<&WireAmount> {
        self.options.value.as_ref()
    }
}

/// Builds proxy action calls from lifecycle requests and issues them.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    units: UnitConverter,
    types: Arc<dyn CdpTypeRegistry>,
    contracts: Arc<dyn ContractResolver>,
    system: Arc<dyn SystemData>,
    proxy_actions: Arc<dyn ProxyActions>,
}

impl ActionDispatcher {
    pub fn new(
        units: UnitConverter,
        types: Arc<dyn CdpTypeRegistry>,
        contracts: Arc<dyn ContractResolver>,
        system: Arc<dyn SystemData>,
        proxy_actions: Arc<dyn ProxyActions>,
    ) -> Self {
        Self {
            units,
            types,
            contracts,
            system,
            proxy_actions,
        }
    }

    pub fn units(&self) -> &UnitConverter {
        &self.units
    }

    /// Collateral kind for an open-lock-and-draw request.
    ///
    /// With no `ilk`, the kind is inferred from the lock amount's currency,
    /// which fails with `PreconditionFailed` if several kinds share it.
    pub fn infer_cdp_type(
        &self,
        ilk: Option<&Ilk>,
        lock: &CurrencyAmount,
    ) -> Result<CdpType, CdpError> {
        self.types.cdp_type(Some(lock.kind()), ilk)
    }

    pub fn open(&self, ilk: &Ilk) -> Result<ProxyCall, CdpError> {
        self.types.cdp_type(None, Some(ilk))?;
        Ok(ProxyCall::new(ProxyAction::Open {
            manager: self.manager()?,
            ilk: ilk.to_bytes32()?,
        }))
    }

    /// Combined lock-and-draw, opening a new position when `id` is `None`.
    pub fn lock_and_draw(
        &self,
        id: Option<CdpId>,
        ilk: &Ilk,
        lock: Option<&CurrencyAmount>,
        draw: Option<&CurrencyAmount>,
    ) -> Result<ProxyCall, CdpError> {
        let (lock, draw) = match (lock, draw) {
            (Some(lock), Some(draw)) => (lock, draw),
            _ => {
                return Err(CdpError::InvalidArgument(
                    "both amounts must be specified".to_string(),
                ))
            }
        };
        self.check_collateral(ilk, lock)?;
        self.check_debt(draw)?;

        let is_native = self.units.is_native(lock.kind());
        let kind = LockDrawKind::select(id, is_native);
        let wad_d = self.units.to_wire(draw)?;
        let lock_wire = self.units.to_wire(lock)?;
        let transfer_from = self.supports_transfer_from(lock);

        let manager = self.manager()?;
        let jug = self.contract(contracts::MCD_JUG)?;
        let join = self.system.adapter_address(ilk)?;
        let dai_join = self.dai_join()?;

        debug!(
            method = kind.method_name(),
            ilk = %ilk,
            lock = %lock,
            draw = %draw,
            "building lock-and-draw"
        );

        let action = match kind {
            LockDrawKind::LockNativeAndDraw(cdp) => ProxyAction::LockEthAndDraw {
                manager,
                jug,
                eth_join: join,
                dai_join,
                cdp,
                wad_d,
            },
            LockDrawKind::LockTokenAndDraw(cdp) => ProxyAction::LockGemAndDraw {
                manager,
                jug,
                gem_join: join,
                dai_join,
                cdp,
                wad_c: lock_wire.clone(),
                wad_d,
                transfer_from,
            },
            LockDrawKind::OpenLockNativeAndDraw => ProxyAction::OpenLockEthAndDraw {
                manager,
                jug,
                eth_join: join,
                dai_join,
                ilk: ilk.to_bytes32()?,
                wad_d,
            },
            LockDrawKind::OpenLockTokenAndDraw => ProxyAction::OpenLockGemAndDraw {
                manager,
                jug,
                gem_join: join,
                dai_join,
                ilk: ilk.to_bytes32()?,
                wad_c: lock_wire.clone(),
                wad_d,
                transfer_from,
            },
        };

        let call = ProxyCall::new(action);
        Ok(if is_native {
            call.with_value(lock_wire)
        } else {
            call
        })
    }

    /// Lock collateral into an existing position without drawing.
    pub fn lock(&self, id: CdpId, ilk: &Ilk, lock: &CurrencyAmount) -> Result<ProxyCall, CdpError> {
        self.check_collateral(ilk, lock)?;
        let lock_wire = self.units.to_wire(lock)?;
        let manager = self.manager()?;
        let join = self.system.adapter_address(ilk)?;

        if self.units.is_native(lock.kind()) {
            Ok(ProxyCall::new(ProxyAction::SafeLockEth {
                manager,
                eth_join: join,
                cdp: id,
            })
            .with_value(lock_wire))
        } else {
            Ok(ProxyCall::new(ProxyAction::SafeLockGem {
                manager,
                gem_join: join,
                cdp: id,
                wad_c: lock_wire,
                transfer_from: self.supports_transfer_from(lock),
            }))
        }
    }

    /// Repay debt and withdraw collateral. A missing wipe amount means zero.
    pub fn wipe_and_free(
        &self,
        id: CdpId,
        ilk: &Ilk,
        wipe: Option<&CurrencyAmount>,
        free: &CurrencyAmount,
    ) -> Result<ProxyCall, CdpError> {
        let zero = CurrencyAmount::zero(self.units.currencies().debt.clone());
        let wipe = wipe.unwrap_or(&zero);
        self.check_collateral(ilk, free)?;
        self.check_debt(wipe)?;

        let wad_c = self.units.to_wire(free)?;
        let wad_d = self.units.to_wire(wipe)?;
        let manager = self.manager()?;
        let join = self.system.adapter_address(ilk)?;
        let dai_join = self.dai_join()?;
        let cdp = id.to_id_bytes();

        let action = if self.units.is_native(free.kind()) {
            ProxyAction::WipeAndFreeEth {
                manager,
                eth_join: join,
                dai_join,
                cdp,
                wad_c,
                wad_d,
            }
        } else {
            ProxyAction::WipeAndFreeGem {
                manager,
                gem_join: join,
                dai_join,
                cdp,
                wad_c,
                wad_d,
            }
        };
        Ok(ProxyCall::new(action))
    }

    /// Repay debt only.
    pub fn wipe(&self, id: CdpId, wipe: &CurrencyAmount) -> Result<ProxyCall, CdpError> {
        self.check_debt(wipe)?;
        Ok(ProxyCall::new(ProxyAction::SafeWipe {
            manager: self.manager()?,
            dai_join: self.dai_join()?,
            cdp: id.to_id_bytes(),
            wad_d: self.units.to_wire(wipe)?,
        }))
    }

    /// Send a built call to the ledger. Failures are returned unchanged.
    pub async fn issue(&self, call: &ProxyCall) -> Result<TxReceipt, CdpError> {
        info!(
            method = call.method_name(),
            value = ?call.value().map(|v| v.to_string()),
            "issuing proxy action"
        );
        let receipt = self.proxy_actions.execute(call).await?;
        if call.action.creates_position() && receipt.new_cdp_id.is_none() {
            return Err(CdpError::InvariantViolation(format!(
                "{} receipt {} carries no new cdp id",
                call.method_name(),
                receipt.tx_hash
            )));
        }
        Ok(receipt)
    }

    fn check_collateral(&self, ilk: &Ilk, amount: &CurrencyAmount) -> Result<(), CdpError> {
        let cdp_type = self.types.cdp_type(None, Some(ilk))?;
        if !amount.is_kind(&cdp_type.currency) {
            return Err(CdpError::InvalidArgument(format!(
                "{} collateral must be {}, got {}",
                ilk,
                cdp_type.currency,
                amount.kind()
            )));
        }
        Ok(())
    }

    fn check_debt(&self, amount: &CurrencyAmount) -> Result<(), CdpError> {
        let debt = &self.units.currencies().debt;
        if !amount.is_kind(debt) {
            return Err(CdpError::InvalidArgument(format!(
                "debt amount must be {}, got {}",
                debt,
                amount.kind()
            )));
        }
        Ok(())
    }

    fn supports_transfer_from(&self, lock: &CurrencyAmount) -> bool {
        !self.units.currencies().requires_custody(lock.kind())
    }

    fn manager(&self) -> Result<Address, CdpError> {
        self.contract(contracts::CDP_MANAGER)
    }

    fn dai_join(&self) -> Result<Address, CdpError> {
        Ok(self
            .system
            .adapter_address(&self.units.currencies().debt_ilk)?)
    }

    fn contract(&self, name: &str) -> Result<Address, CdpError> {
        Ok(self.contracts.contract_address(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_table() {
        let id = Some(CdpId::new(7));
        assert_eq!(LockDrawKind::select(id, true).method_name(), "lockETHAndDraw");
        assert_eq!(LockDrawKind::select(id, false).method_name(), "lockGemAndDraw");
        assert_eq!(
            LockDrawKind::select(None, true).method_name(),
            "openLockETHAndDraw"
        );
        assert_eq!(
            LockDrawKind::select(None, false).method_name(),
            "openLockGemAndDraw"
        );
        assert_eq!(
            LockDrawKind::select(id, true),
            LockDrawKind::LockNativeAndDraw(CdpId::new(7))
        );
    }

    #[test]
    fn test_open_creates_position() {
        let action = ProxyAction::Open {
            manager: Address::new("0x01"),
            ilk: Ilk::new("ETH-A").to_bytes32().unwrap(),
        };
        assert!(action.creates_position());
        assert_eq!(action.method_name(), "open");
        assert_eq!(action.args().len(), 2);
    }

    #[test]
    fn test_safe_wipe_uses_id_bytes() {
        let action = ProxyAction::SafeWipe {
            manager: Address::new("0x01"),
            dai_join: Address::new("0x02"),
            cdp: CdpId::new(16).to_id_bytes(),
            wad_d: WireAmount::zero(),
        };
        assert!(!action.creates_position());
        assert_eq!(
            action.args()[2],
            CallArg::IdBytes("0x000000000000000000000010".to_string())
        );
    }
}
