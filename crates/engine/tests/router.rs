mod common;

use std::sync::Arc;

use incentive_core::campaign::{Campaign, TargetType};
use incentive_engine::ChangeRouter;
use incentive_events::{ChangeEvent, EventBus};
use tokio_util::sync::CancellationToken;

use common::{add_linked, next_snapshot, setup, tx, wait_until};

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn campaign_edit_resolves_to_itself() {
    let (_store, coordinator) = setup();
    let router = ChangeRouter::new(coordinator);

    let ids = router.resolve(&ChangeEvent::campaign_edited(9)).await.unwrap();
    assert_eq!(ids, vec![9]);
}

#[tokio::test]
async fn link_change_resolves_to_its_campaign() {
    let (_store, coordinator) = setup();
    let router = ChangeRouter::new(coordinator);

    let ids = router.resolve(&ChangeEvent::link_changed(3, 17)).await.unwrap();
    assert_eq!(ids, vec![17]);
}

#[tokio::test]
async fn transaction_edit_resolves_through_active_links() {
    let (store, coordinator) = setup();
    store.upsert_campaign(Campaign::simple(1, TargetType::Value, 100.0));
    store.upsert_campaign(Campaign::simple(2, TargetType::Value, 100.0));
    store.upsert_campaign(Campaign::simple(3, TargetType::Value, 100.0));
    add_linked(&store, 1, tx(10, "auto", 5.0));
    store.link(2, 10);
    store.link(3, 10);
    store.deactivate_link(3, 10);

    let router = ChangeRouter::new(coordinator);
    let ids = router.resolve(&ChangeEvent::transaction_edited(10)).await.unwrap();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn resync_resolves_to_active_campaigns() {
    let (store, coordinator) = setup();
    store.upsert_campaign(Campaign::simple(1, TargetType::Value, 100.0));
    store.upsert_campaign(Campaign::simple(2, TargetType::Value, 100.0));
    store.set_campaign_active(2, false);

    let router = ChangeRouter::new(coordinator);
    let ids = router.resolve(&ChangeEvent::resync()).await.unwrap();
    assert_eq!(ids, vec![1]);
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bus_events_reach_subscribers() {
    let (store, coordinator) = setup();
    store.upsert_campaign(Campaign::simple(1, TargetType::Value, 100.0));
    add_linked(&store, 1, tx(10, "auto", 20.0));

    let bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();
    let router = ChangeRouter::new(coordinator.clone());
    let task = tokio::spawn(router.run(bus.subscribe(), cancel.clone()));

    let mut subscription = coordinator.subscribe(1);
    bus.publish(ChangeEvent::link_changed(1, 1));
    assert_eq!(next_snapshot(&mut subscription).await.percentage, 20.0);

    store.upsert_transaction(tx(10, "auto", 80.0));
    bus.publish(ChangeEvent::transaction_edited(10));
    assert_eq!(next_snapshot(&mut subscription).await.percentage, 80.0);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn router_stops_when_bus_is_dropped() {
    let (_store, coordinator) = setup();
    let bus = EventBus::default();
    let task = tokio::spawn(ChangeRouter::new(coordinator).run(bus.subscribe(), CancellationToken::new()));

    drop(bus);
    task.await.unwrap();
}

#[tokio::test]
async fn lagged_router_recomputes_everything() {
    let (store, coordinator) = setup();
    store.upsert_campaign(Campaign::simple(1, TargetType::Value, 100.0));
    store.upsert_campaign(Campaign::simple(2, TargetType::Value, 100.0));

    let bus = EventBus::new(2);
    let receiver = bus.subscribe();
    for _ in 0..5 {
        bus.publish(ChangeEvent::link_changed(99, 42));
    }

    let cancel = CancellationToken::new();
    let task = tokio::spawn(ChangeRouter::new(coordinator.clone()).run(receiver, cancel.clone()));

    wait_until(|| coordinator.latest(1).is_some() && coordinator.latest(2).is_some()).await;
    cancel.cancel();
    task.await.unwrap();
}
