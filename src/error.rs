use crate::domain::{IlkParseError, ScaleError};
use crate::ledger::RemoteError;
use thiserror::Error;

/// Failure of a position-manager operation.
///
/// Validation-stage variants are raised before any remote call is issued.
/// `Remote` carries a collaborator failure through unchanged.
#[derive(Debug, Clone, Error)]
pub enum CdpError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl CdpError {
    /// True for failures detected before anything was sent to the ledger.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CdpError::InvalidArgument(_) | CdpError::PreconditionFailed(_)
        )
    }
}

impl From<ScaleError> for CdpError {
    fn from(err: ScaleError) -> Self {
        CdpError::InvalidArgument(err.to_string())
    }
}

impl From<IlkParseError> for CdpError {
    fn from(err: IlkParseError) -> Self {
        CdpError::InvalidArgument(err.to_string())
    }
}
