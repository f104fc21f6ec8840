//! The persistence seam consumed by the progress engine.
//!
//! The Postgres implementation lives in `incentive-db`; the engine crate
//! ships an in-memory one for tests and local runs.

use async_trait::async_trait;

use crate::campaign::{Campaign, LinkedTransaction};
use crate::types::DbId;

/// Failure of the persistence collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backend did not answer (connection, timeout, query failure).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be converted into a domain value.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Selects campaigns for batch recalculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    /// Only campaigns assigned to this seller.
    pub user_id: Option<DbId>,
    /// Include deactivated campaigns.
    pub include_inactive: bool,
}

/// Read access to campaigns, links and transactions.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Check that the backend answers.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Load a campaign definition; `None` when the id does not resolve.
    async fn get_campaign(&self, id: DbId) -> Result<Option<Campaign>, StoreError>;

    /// Active links of a campaign, each with its transaction when it exists.
    async fn list_active_links(
        &self,
        campaign_id: DbId,
    ) -> Result<Vec<LinkedTransaction>, StoreError>;

    /// Campaigns holding an active link to the given transaction.
    async fn campaigns_for_transaction(
        &self,
        transaction_id: DbId,
    ) -> Result<Vec<DbId>, StoreError>;

    /// Ids of all campaigns matching the filter, ascending.
    async fn list_campaign_ids(&self, filter: &CampaignFilter) -> Result<Vec<DbId>, StoreError>;
}
