//! Postgres-backed [`ProgressStore`].

use async_trait::async_trait;
use incentive_core::campaign::{Campaign, LinkedTransaction};
use incentive_core::store::{CampaignFilter, ProgressStore, StoreError};
use incentive_core::types::DbId;

use crate::repositories::{CampaignRepo, LinkRepo};
use crate::DbPool;

/// Reads campaigns and links through the repositories.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: DbPool,
}

impl PgProgressStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(unavailable)
    }

    async fn get_campaign(&self, id: DbId) -> Result<Option<Campaign>, StoreError> {
        let Some(row) = CampaignRepo::find_by_id(&self.pool, id)
            .await
            .map_err(unavailable)?
        else {
            return Ok(None);
        };

        Campaign::try_from(row)
            .map(Some)
            .map_err(|e| StoreError::InvalidRecord(format!("campaign {id}: {e}")))
    }

    async fn list_active_links(
        &self,
        campaign_id: DbId,
    ) -> Result<Vec<LinkedTransaction>, StoreError> {
        let rows = LinkRepo::list_active_with_transactions(&self.pool, campaign_id)
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(LinkedTransaction::from).collect())
    }

    async fn campaigns_for_transaction(
        &self,
        transaction_id: DbId,
    ) -> Result<Vec<DbId>, StoreError> {
        CampaignRepo::ids_for_transaction(&self.pool, transaction_id)
            .await
            .map_err(unavailable)
    }

    async fn list_campaign_ids(&self, filter: &CampaignFilter) -> Result<Vec<DbId>, StoreError> {
        CampaignRepo::list_ids(&self.pool, filter)
            .await
            .map_err(unavailable)
    }
}
