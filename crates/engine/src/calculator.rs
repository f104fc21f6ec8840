//! Loads campaign data and runs the pure progress calculation.

use std::sync::Arc;

use chrono::Utc;
use incentive_core::campaign::{LinkedTransaction, Transaction};
use incentive_core::progress::{calculate, CalculationOptions, ProgressSnapshot, Strategy};
use incentive_core::store::ProgressStore;
use incentive_core::types::DbId;

use crate::error::ProgressError;

/// Orchestrates one progress computation for a campaign.
///
/// Loading the campaign and its links are the only suspension points; the
/// calculation itself is synchronous.
pub struct ProgressCalculator {
    store: Arc<dyn ProgressStore>,
    options: CalculationOptions,
}

impl ProgressCalculator {
    pub fn new(store: Arc<dyn ProgressStore>, options: CalculationOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    /// Compute a fresh snapshot stamped with `generation` and the current time.
    pub async fn compute(
        &self,
        campaign_id: DbId,
        generation: u64,
    ) -> Result<ProgressSnapshot, ProgressError> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(ProgressError::NotFound(campaign_id))?;

        let links = self.store.list_active_links(campaign_id).await?;
        let transactions = resolve_transactions(campaign_id, links);

        let calculation = calculate(&campaign, &transactions, &self.options);
        if calculation.strategy == Strategy::FallbackSimple {
            tracing::warn!(
                campaign_id,
                reason = calculation.fallback_reason.as_deref().unwrap_or_default(),
                "Composite criteria unusable, falling back to simple ratio"
            );
        }

        let snapshot = calculation.into_snapshot(campaign_id, generation, Utc::now());
        tracing::debug!(
            campaign_id,
            generation,
            percentage = snapshot.percentage,
            current_value = snapshot.current_value,
            is_completed = snapshot.is_completed,
            "Progress computed"
        );
        Ok(snapshot)
    }
}

/// Keep transactions of active links; links whose transaction is missing
/// are dropped rather than failing the computation.
fn resolve_transactions(campaign_id: DbId, links: Vec<LinkedTransaction>) -> Vec<Transaction> {
    let total = links.len();
    let transactions: Vec<Transaction> = links
        .into_iter()
        .filter(|l| l.link.is_active)
        .filter_map(|l| l.transaction)
        .collect();

    let dropped = total - transactions.len();
    if dropped > 0 {
        tracing::debug!(campaign_id, dropped, "Ignored links without a resolvable transaction");
    }
    transactions
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
