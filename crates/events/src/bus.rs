//! In-process change bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`. Producers (the Postgres
//! feed, admin tooling, tests) publish [`ChangeEvent`]s; the engine's
//! router subscribes once and resolves each event to campaign ids.

use chrono::{DateTime, Utc};
use incentive_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// ChangeTopic
// ---------------------------------------------------------------------------

/// Postgres channel for campaign definition edits.
pub const CHANNEL_CAMPAIGNS: &str = "campaign_changes";
/// Postgres channel for link additions, removals and deactivations.
pub const CHANNEL_LINKS: &str = "campaign_link_changes";
/// Postgres channel for transaction edits.
pub const CHANNEL_TRANSACTIONS: &str = "transaction_changes";

/// Source of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTopic {
    CampaignDefinitions,
    Links,
    Transactions,
    /// Changes may have been missed (feed reconnected or a receiver lagged);
    /// every campaign should be recomputed.
    Resync,
}

impl ChangeTopic {
    /// Map a Postgres `LISTEN` channel name to its topic.
    pub fn from_channel(channel: &str) -> Option<Self> {
        match channel {
            CHANNEL_CAMPAIGNS => Some(Self::CampaignDefinitions),
            CHANNEL_LINKS => Some(Self::Links),
            CHANNEL_TRANSACTIONS => Some(Self::Transactions),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CampaignDefinitions => "campaign_definitions",
            Self::Links => "links",
            Self::Transactions => "transactions",
            Self::Resync => "resync",
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeEvent
// ---------------------------------------------------------------------------

/// A raw change from one of the mutation sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub topic: ChangeTopic,

    /// Id of the changed row (campaign, link or transaction).
    pub entity_id: DbId,

    /// Affected campaign when the source knows it (campaign and link edits).
    pub campaign_id: Option<DbId>,

    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(topic: ChangeTopic, entity_id: DbId) -> Self {
        Self {
            topic,
            entity_id,
            campaign_id: None,
            timestamp: Utc::now(),
        }
    }

    /// A campaign definition was created or edited.
    pub fn campaign_edited(campaign_id: DbId) -> Self {
        Self::new(ChangeTopic::CampaignDefinitions, campaign_id).with_campaign(campaign_id)
    }

    /// A link of the given campaign was added, removed or toggled.
    pub fn link_changed(link_id: DbId, campaign_id: DbId) -> Self {
        Self::new(ChangeTopic::Links, link_id).with_campaign(campaign_id)
    }

    /// A transaction was edited; the affected campaigns must be looked up.
    pub fn transaction_edited(transaction_id: DbId) -> Self {
        Self::new(ChangeTopic::Transactions, transaction_id)
    }

    pub fn resync() -> Self {
        Self::new(ChangeTopic::Resync, 0)
    }

    pub fn with_campaign(mut self, campaign_id: DbId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out change bus.
///
/// # Usage
///
/// ```rust
/// use incentive_events::bus::{ChangeEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ChangeEvent::campaign_edited(42));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed events are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: ChangeEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every change. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
