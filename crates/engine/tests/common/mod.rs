#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use incentive_core::campaign::{ContractType, Transaction};
use incentive_core::progress::ProgressSnapshot;
use incentive_core::types::{DbId, Timestamp};
use incentive_engine::{
    ChangeCoordinator, EngineConfig, MemoryStore, ProgressCalculator, SnapshotSubscription,
};

/// How long a test waits for background work before failing.
const WAIT_LIMIT: Duration = Duration::from_secs(2);

pub fn at(day: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2026, 5, day, 9, 0, 0).unwrap()
}

pub fn tx(id: DbId, category: &str, value: f64) -> Transaction {
    Transaction {
        id,
        category: category.to_string(),
        value,
        contract_type: ContractType::New,
        registered_at: at(2),
    }
}

/// Coordinator over a fresh in-memory store with default configuration.
pub fn setup() -> (Arc<MemoryStore>, ChangeCoordinator) {
    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig::default();
    let calculator = ProgressCalculator::new(store.clone(), config.calculation_options());
    (store, ChangeCoordinator::new(calculator, &config))
}

/// Store a transaction and link it to the campaign.
pub fn add_linked(store: &MemoryStore, campaign_id: DbId, transaction: Transaction) -> DbId {
    let id = transaction.id;
    store.upsert_transaction(transaction);
    store.link(campaign_id, id)
}

/// Poll `condition` until it holds, panicking after [`WAIT_LIMIT`].
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub async fn next_snapshot(subscription: &mut SnapshotSubscription) -> ProgressSnapshot {
    tokio::time::timeout(WAIT_LIMIT, subscription.recv())
        .await
        .expect("no snapshot published in time")
        .expect("coordinator dropped")
}

/// Wait until the campaign has no driver running.
pub async fn wait_settled(coordinator: &ChangeCoordinator, campaign_id: DbId) {
    wait_until(|| !coordinator.status(campaign_id).in_flight).await;
}
