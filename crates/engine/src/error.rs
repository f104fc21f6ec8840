use incentive_core::store::StoreError;
use incentive_core::types::DbId;

/// Failure of a progress computation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProgressError {
    /// The campaign id does not resolve. Callers must not synthesize a
    /// snapshot for it.
    #[error("Campaign {0} not found")]
    NotFound(DbId),

    /// The persistence collaborator failed to answer.
    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] StoreError),
}
