//! Batch recomputation of every campaign matching a filter.

use futures::stream::{self, StreamExt};
use incentive_core::store::CampaignFilter;
use serde::Serialize;

use crate::coordinator::ChangeCoordinator;
use crate::error::ProgressError;

/// Outcome counts of a batch recomputation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecalcSummary {
    /// Campaigns matched by the filter.
    pub total: usize,
    pub computed: usize,
    /// Campaigns deleted between listing and computing.
    pub not_found: usize,
    pub failed: usize,
}

impl ChangeCoordinator {
    /// Recompute and publish every campaign matched by `filter`.
    ///
    /// Up to `recalc_concurrency` campaigns are computed at once. Failures
    /// of individual campaigns are counted, not returned; only failing to
    /// list the campaigns is an error.
    pub async fn recalculate_all(
        &self,
        filter: &CampaignFilter,
    ) -> Result<RecalcSummary, ProgressError> {
        let ids = self.store().list_campaign_ids(filter).await?;
        let mut summary = RecalcSummary {
            total: ids.len(),
            ..RecalcSummary::default()
        };

        tracing::info!(
            total = summary.total,
            user_id = ?filter.user_id,
            include_inactive = filter.include_inactive,
            "Recalculating campaign progress"
        );

        let mut results = stream::iter(ids)
            .map(|id| async move { (id, self.compute_progress(id).await) })
            .buffer_unordered(self.inner.recalc_concurrency);

        while let Some((campaign_id, result)) = results.next().await {
            match result {
                Ok(_) => summary.computed += 1,
                Err(ProgressError::NotFound(_)) => summary.not_found += 1,
                Err(e) => {
                    tracing::error!(campaign_id, error = %e, "Recalculation failed");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            total = summary.total,
            computed = summary.computed,
            not_found = summary.not_found,
            failed = summary.failed,
            "Recalculation finished"
        );
        Ok(summary)
    }

    /// Schedule every campaign matched by `filter` through [`notify`](Self::notify).
    ///
    /// Used after changes may have been missed. Returns the number of
    /// campaigns scheduled.
    pub async fn resync(&self, filter: &CampaignFilter) -> Result<usize, ProgressError> {
        let ids = self.store().list_campaign_ids(filter).await?;
        for &id in &ids {
            self.notify(id);
        }
        tracing::info!(scheduled = ids.len(), "Resync scheduled");
        Ok(ids.len())
    }
}
