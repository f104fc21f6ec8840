//! End-to-end tests for the progress WebSocket over a real listener.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use incentive_core::campaign::{Campaign, ContractType, TargetType, Transaction};
use incentive_engine::MemoryStore;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use common::build_test_app;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn sale(store: &MemoryStore, campaign_id: i64, id: i64, value: f64) {
    store.upsert_transaction(Transaction {
        id,
        category: "life".to_string(),
        value,
        contract_type: ContractType::Renewal,
        registered_at: Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap(),
    });
    store.link(campaign_id, id);
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Next text frame parsed as JSON, skipping control frames.
async fn next_json(socket: &mut Socket) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("stream ended: {other:?}"),
            }
        }
    })
    .await
    .expect("no frame in time")
}

#[tokio::test]
async fn stream_sends_initial_and_later_snapshots() {
    let app = build_test_app();
    app.store.upsert_campaign(Campaign::simple(1, TargetType::Value, 100.0));
    sale(&app.store, 1, 10, 20.0);
    let addr = serve(app.router).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/api/v1/campaigns/1/progress/ws"))
        .await
        .unwrap();

    let first = next_json(&mut socket).await;
    assert_eq!(first["campaign_id"], 1);
    assert_eq!(first["percentage"], 20.0);

    sale(&app.store, 1, 11, 30.0);
    app.coordinator.notify(1);

    let second = next_json(&mut socket).await;
    assert_eq!(second["percentage"], 50.0);
    assert!(second["generation"].as_u64() > first["generation"].as_u64());
}

#[tokio::test]
async fn stream_replays_latest_snapshot_on_connect() {
    let app = build_test_app();
    app.store.upsert_campaign(Campaign::simple(2, TargetType::Quantity, 4.0));
    sale(&app.store, 2, 10, 1.0);
    let published = app.coordinator.compute_progress(2).await.unwrap();
    let addr = serve(app.router).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/api/v1/campaigns/2/progress/ws"))
        .await
        .unwrap();

    let first = next_json(&mut socket).await;
    assert_eq!(first["generation"], published.generation);
    assert_eq!(first["percentage"], 25.0);
}

#[tokio::test]
async fn stream_for_unknown_campaign_is_refused() {
    let app = build_test_app();
    let addr = serve(app.router).await;

    let result = connect_async(format!("ws://{addr}/api/v1/campaigns/404/progress/ws")).await;
    assert!(result.is_err());
}
