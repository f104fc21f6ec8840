//! Postgres `LISTEN` source for the three change streams.
//!
//! [`PgChangeFeed`] listens on the channels written by the notification
//! triggers in `db/migrations` and republishes each notification as a
//! [`ChangeEvent`] on the [`EventBus`]. Notifications sent while the
//! listener connection is down are lost, so after every reconnect the feed
//! publishes a [`ChangeTopic::Resync`] event.

use std::sync::Arc;
use std::time::Duration;

use incentive_core::types::DbId;
use incentive_db::DbPool;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use tokio_util::sync::CancellationToken;

use crate::bus::{
    ChangeEvent, ChangeTopic, EventBus, CHANNEL_CAMPAIGNS, CHANNEL_LINKS, CHANNEL_TRANSACTIONS,
};

/// Delay between reconnection attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Channels the feed listens on.
const CHANNELS: [&str; 3] = [CHANNEL_CAMPAIGNS, CHANNEL_LINKS, CHANNEL_TRANSACTIONS];

/// JSON payload written by the notification triggers.
#[derive(Debug, Deserialize)]
struct NotifyPayload {
    id: DbId,
    campaign_id: Option<DbId>,
}

/// Parse one notification into a change event.
///
/// Returns `None` for unknown channels and unreadable payloads.
pub fn parse_notification(channel: &str, payload: &str) -> Option<ChangeEvent> {
    let topic = ChangeTopic::from_channel(channel)?;
    let parsed: NotifyPayload = match serde_json::from_str(payload) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(channel, payload, error = %e, "Unreadable change notification");
            return None;
        }
    };

    let mut event = ChangeEvent::new(topic, parsed.id);
    event.campaign_id = match topic {
        ChangeTopic::CampaignDefinitions => Some(parsed.campaign_id.unwrap_or(parsed.id)),
        _ => parsed.campaign_id,
    };
    Some(event)
}

/// Background service forwarding Postgres notifications to the bus.
pub struct PgChangeFeed {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl PgChangeFeed {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Run until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        let Some(mut listener) = self.connect(&cancel).await else {
            return;
        };
        tracing::info!(channels = ?CHANNELS, "Change feed listening");

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => None,
                received = listener.try_recv() => Some(received),
            };
            let Some(received) = received else {
                tracing::info!("Change feed shutting down");
                break;
            };

            match received {
                Ok(Some(notification)) => {
                    if let Some(event) =
                        parse_notification(notification.channel(), notification.payload())
                    {
                        tracing::debug!(
                            topic = event.topic.as_str(),
                            entity_id = event.entity_id,
                            campaign_id = ?event.campaign_id,
                            "Change received"
                        );
                        self.bus.publish(event);
                    }
                    continue;
                }
                Ok(None) => tracing::warn!("Change feed connection lost, reconnecting"),
                Err(e) => tracing::error!(error = %e, "Change feed receive failed, reconnecting"),
            }

            match self.connect(&cancel).await {
                Some(fresh) => {
                    listener = fresh;
                    self.bus.publish(ChangeEvent::resync());
                }
                None => break,
            }
        }
    }

    /// Connect and `LISTEN`, retrying until success or cancellation.
    async fn connect(&self, cancel: &CancellationToken) -> Option<PgListener> {
        loop {
            match self.try_connect().await {
                Ok(listener) => return Some(listener),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in_ms = RECONNECT_DELAY.as_millis() as u64,
                        "Change feed failed to connect"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    async fn try_connect(&self) -> Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen_all(CHANNELS).await?;
        Ok(listener)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
