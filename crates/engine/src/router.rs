//! Change-event routing.
//!
//! [`ChangeRouter`] consumes raw [`ChangeEvent`]s from the bus, resolves
//! each one to the campaigns it affects and hands those to the
//! [`ChangeCoordinator`].

use incentive_core::store::CampaignFilter;
use incentive_core::types::DbId;
use incentive_events::{ChangeEvent, ChangeTopic};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::coordinator::ChangeCoordinator;
use crate::error::ProgressError;

/// Resolves change events to campaign ids and notifies the coordinator.
pub struct ChangeRouter {
    coordinator: ChangeCoordinator,
}

impl ChangeRouter {
    pub fn new(coordinator: ChangeCoordinator) -> Self {
        Self { coordinator }
    }

    /// Run the routing loop until `cancel` fires or the bus is dropped.
    ///
    /// A lagged receiver has lost events, so it is treated as a resync.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<ChangeEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Change router shutting down");
                    break;
                }
                received = receiver.recv() => received,
            };

            match received {
                Ok(event) => self.route(&event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Change router lagged, resyncing");
                    self.route(&ChangeEvent::resync()).await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, change router shutting down");
                    break;
                }
            }
        }
    }

    /// Notify the coordinator of every campaign affected by `event`.
    ///
    /// Resolution failures are logged; the event is dropped.
    pub async fn route(&self, event: &ChangeEvent) {
        match self.resolve(event).await {
            Ok(campaign_ids) => {
                tracing::debug!(
                    topic = event.topic.as_str(),
                    entity_id = event.entity_id,
                    campaigns = campaign_ids.len(),
                    "Change routed"
                );
                for campaign_id in campaign_ids {
                    self.coordinator.notify(campaign_id);
                }
            }
            Err(e) => {
                tracing::error!(
                    topic = event.topic.as_str(),
                    entity_id = event.entity_id,
                    error = %e,
                    "Failed to resolve change"
                );
            }
        }
    }

    /// Campaign ids affected by a change.
    pub async fn resolve(&self, event: &ChangeEvent) -> Result<Vec<DbId>, ProgressError> {
        match event.topic {
            ChangeTopic::CampaignDefinitions => {
                Ok(vec![event.campaign_id.unwrap_or(event.entity_id)])
            }
            ChangeTopic::Links => match event.campaign_id {
                Some(campaign_id) => Ok(vec![campaign_id]),
                None => {
                    tracing::warn!(link_id = event.entity_id, "Link change without a campaign");
                    Ok(Vec::new())
                }
            },
            ChangeTopic::Transactions => Ok(self
                .coordinator
                .store()
                .campaigns_for_transaction(event.entity_id)
                .await?),
            ChangeTopic::Resync => Ok(self
                .coordinator
                .store()
                .list_campaign_ids(&CampaignFilter::default())
                .await?),
        }
    }
}
