//! Integration tests for the Postgres progress store.
//!
//! Require `DATABASE_URL` pointing at a disposable Postgres server:
//! `cargo test -p incentive-db -- --ignored`.

use incentive_core::campaign::{CampaignCriteria, CampaignKind};
use incentive_core::store::{CampaignFilter, ProgressStore};
use incentive_db::models::campaign::CreateCampaign;
use incentive_db::models::transaction::CreateTransaction;
use incentive_db::repositories::{CampaignRepo, LinkRepo, TransactionRepo};
use incentive_db::PgProgressStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_campaign(user_id: Option<i64>, kind: &str, criteria: Option<serde_json::Value>) -> CreateCampaign {
    CreateCampaign {
        user_id,
        name: "Q3 push".to_string(),
        kind: kind.to_string(),
        target_type: Some("value".to_string()),
        target: Some(100_000.0),
        criteria,
        status: Some("active".to_string()),
        accepted_at: None,
    }
}

fn new_transaction(category: &str, value: f64) -> CreateTransaction {
    CreateTransaction {
        category: category.to_string(),
        value,
        contract_type: "new".to_string(),
        registered_at: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn loads_campaign_with_string_encoded_criteria(pool: PgPool) {
    let encoded = serde_json::json!(
        r#"[{"policy_type":"auto","target_type":"quantity","target_value":10}]"#
    );
    let row = CampaignRepo::create(&pool, &new_campaign(None, "composite", Some(encoded)))
        .await
        .unwrap();

    let store = PgProgressStore::new(pool);
    let campaign = store.get_campaign(row.id).await.unwrap().unwrap();

    assert_eq!(campaign.kind, CampaignKind::Composite);
    match campaign.criteria {
        CampaignCriteria::Parsed(criteria) => assert_eq!(criteria.len(), 1),
        other => panic!("expected parsed criteria, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn missing_campaign_is_none(pool: PgPool) {
    let store = PgProgressStore::new(pool);
    assert!(store.get_campaign(987_654).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn active_links_resolve_transactions(pool: PgPool) {
    let campaign = CampaignRepo::create(&pool, &new_campaign(Some(4), "simple", None))
        .await
        .unwrap();
    let kept = TransactionRepo::create(&pool, &new_transaction("auto", 40_000.0))
        .await
        .unwrap();
    let dropped = TransactionRepo::create(&pool, &new_transaction("life", 35_000.0))
        .await
        .unwrap();
    let deleted = TransactionRepo::create(&pool, &new_transaction("home", 1_000.0))
        .await
        .unwrap();

    LinkRepo::link(&pool, campaign.id, kept.id).await.unwrap();
    LinkRepo::link(&pool, campaign.id, dropped.id).await.unwrap();
    LinkRepo::link(&pool, campaign.id, deleted.id).await.unwrap();
    LinkRepo::deactivate(&pool, campaign.id, dropped.id).await.unwrap();
    TransactionRepo::delete(&pool, deleted.id).await.unwrap();

    let store = PgProgressStore::new(pool);
    let links = store.list_active_links(campaign.id).await.unwrap();

    assert_eq!(links.len(), 2);
    assert_eq!(links[0].transaction.as_ref().unwrap().value, 40_000.0);
    assert!(links[1].transaction.is_none());

    assert_eq!(
        store.campaigns_for_transaction(kept.id).await.unwrap(),
        vec![campaign.id]
    );
    assert!(store
        .campaigns_for_transaction(dropped.id)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn list_ids_filters_by_user_and_activity(pool: PgPool) {
    let a = CampaignRepo::create(&pool, &new_campaign(Some(1), "simple", None))
        .await
        .unwrap();
    let b = CampaignRepo::create(&pool, &new_campaign(Some(2), "simple", None))
        .await
        .unwrap();
    let c = CampaignRepo::create(&pool, &new_campaign(Some(1), "simple", None))
        .await
        .unwrap();
    CampaignRepo::set_active(&pool, c.id, false).await.unwrap();

    let store = PgProgressStore::new(pool);

    let all_active = store
        .list_campaign_ids(&CampaignFilter::default())
        .await
        .unwrap();
    assert_eq!(all_active, vec![a.id, b.id]);

    let user_one = store
        .list_campaign_ids(&CampaignFilter {
            user_id: Some(1),
            include_inactive: true,
        })
        .await
        .unwrap();
    assert_eq!(user_one, vec![a.id, c.id]);
}
