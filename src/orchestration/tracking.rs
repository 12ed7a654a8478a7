//! Lifecycle notifications for state-changing operations.
//!
//! [`tracked`] wraps an operation's future and reports started, settled or
//! failed to an injected [`TransactionObserver`]. The wrapped result passes
//! through untouched.

use crate::error::CdpError;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use tracing::{info, warn};
use uuid::Uuid;

/// Identity of one tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        OperationId(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait TransactionObserver: Send + Sync + fmt::Debug {
    fn started(&self, op: OperationId, label: &'static str);
    fn settled(&self, op: OperationId, label: &'static str);
    fn failed(&self, op: OperationId, label: &'static str, err: &CdpError);
}

/// Reports lifecycle notifications as log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TransactionObserver for TracingObserver {
    fn started(&self, op: OperationId, label: &'static str) {
        info!(op = %op, label, "operation started");
    }

    fn settled(&self, op: OperationId, label: &'static str) {
        info!(op = %op, label, "operation settled");
    }

    fn failed(&self, op: OperationId, label: &'static str, err: &CdpError) {
        warn!(op = %op, label, error = %err, validation = err.is_validation(), "operation failed");
    }
}

/// Run `operation`, notifying `observer` before it starts and after it ends.
pub async fn tracked<T, F>(
    observer: &dyn TransactionObserver,
    label: &'static str,
    operation: F,
) -> Result<T, CdpError>
where
    F: Future<Output = Result<T, CdpError>>,
{
    let op = OperationId::new();
    observer.started(op, label);
    match operation.await {
        Ok(value) => {
            observer.settled(op, label);
            Ok(value)
        }
        Err(err) => {
            observer.failed(op, label, &err);
            Err(err)
        }
    }
}
