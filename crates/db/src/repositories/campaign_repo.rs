//! Repository for the `campaigns` table.

use incentive_core::campaign::{KIND_SIMPLE, STATUS_PENDING, TARGET_VALUE};
use incentive_core::store::CampaignFilter;
use incentive_core::types::DbId;
use sqlx::PgPool;

use crate::models::campaign::{CampaignRow, CreateCampaign};

/// Column list for `campaigns` queries.
const COLUMNS: &str = "\
    id, user_id, name, kind, target_type, target, criteria, status, \
    accepted_at, is_active, created_at, updated_at";

/// Provides reads and the few writes the engine's tooling needs.
pub struct CampaignRepo;

impl CampaignRepo {
    /// Insert a campaign and return the stored row.
    pub async fn create(pool: &PgPool, input: &CreateCampaign) -> Result<CampaignRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO campaigns (user_id, name, kind, target_type, target, criteria, status, accepted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CampaignRow>(&query)
            .bind(input.user_id)
            .bind(&input.name)
            .bind(if input.kind.is_empty() { KIND_SIMPLE } else { input.kind.as_str() })
            .bind(input.target_type.as_deref().unwrap_or(TARGET_VALUE))
            .bind(input.target.unwrap_or(0.0))
            .bind(&input.criteria)
            .bind(input.status.as_deref().unwrap_or(STATUS_PENDING))
            .bind(input.accepted_at)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CampaignRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = $1");
        sqlx::query_as::<_, CampaignRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Ids of campaigns matching the filter, ascending.
    pub async fn list_ids(pool: &PgPool, filter: &CampaignFilter) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM campaigns \
             WHERE ($1::BIGINT IS NULL OR user_id = $1) \
               AND ($2 OR is_active) \
             ORDER BY id",
        )
        .bind(filter.user_id)
        .bind(filter.include_inactive)
        .fetch_all(pool)
        .await
    }

    /// Campaigns with an active link to the transaction.
    pub async fn ids_for_transaction(
        pool: &PgPool,
        transaction_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT DISTINCT campaign_id FROM campaign_links \
             WHERE transaction_id = $1 AND is_active \
             ORDER BY campaign_id",
        )
        .bind(transaction_id)
        .fetch_all(pool)
        .await
    }

    /// Activate or deactivate a campaign. Returns `true` if a row changed.
    pub async fn set_active(pool: &PgPool, id: DbId, is_active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(is_active)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
