//! Repository for the `campaign_links` table.

use incentive_core::types::DbId;
use sqlx::PgPool;

use crate::models::link::{LinkRow, LinkedTransactionRow};

const COLUMNS: &str = "id, campaign_id, transaction_id, is_active, linked_at";

pub struct LinkRepo;

impl LinkRepo {
    /// Link a transaction to a campaign, reactivating an existing link.
    pub async fn link(
        pool: &PgPool,
        campaign_id: DbId,
        transaction_id: DbId,
    ) -> Result<LinkRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO campaign_links (campaign_id, transaction_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_campaign_links_pair \
             DO UPDATE SET is_active = TRUE, linked_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LinkRow>(&query)
            .bind(campaign_id)
            .bind(transaction_id)
            .fetch_one(pool)
            .await
    }

    /// Deactivate a link without deleting the transaction.
    pub async fn deactivate(
        pool: &PgPool,
        campaign_id: DbId,
        transaction_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaign_links SET is_active = FALSE \
             WHERE campaign_id = $1 AND transaction_id = $2 AND is_active",
        )
        .bind(campaign_id)
        .bind(transaction_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active links of a campaign left-joined with their transactions.
    pub async fn list_active_with_transactions(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<LinkedTransactionRow>, sqlx::Error> {
        sqlx::query_as::<_, LinkedTransactionRow>(
            "SELECT l.id, l.campaign_id, l.transaction_id, l.is_active, l.linked_at, \
                    t.id AS tx_id, t.category AS tx_category, t.value AS tx_value, \
                    t.contract_type AS tx_contract_type, t.registered_at AS tx_registered_at \
             FROM campaign_links l \
             LEFT JOIN transactions t ON t.id = l.transaction_id \
             WHERE l.campaign_id = $1 AND l.is_active \
             ORDER BY l.id",
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
    }
}
