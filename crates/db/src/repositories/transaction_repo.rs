//! Repository for the `transactions` table.
//!
//! Transactions are owned by the sales service; writes here exist for
//! seeding and tests.

use incentive_core::types::DbId;
use sqlx::PgPool;

use crate::models::transaction::{CreateTransaction, TransactionRow};

const COLUMNS: &str = "id, category, value, contract_type, registered_at";

pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateTransaction,
    ) -> Result<TransactionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO transactions (category, value, contract_type, registered_at) \
             VALUES ($1, $2, $3, COALESCE($4, NOW())) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TransactionRow>(&query)
            .bind(&input.category)
            .bind(input.value)
            .bind(&input.contract_type)
            .bind(input.registered_at)
            .fetch_one(pool)
            .await
    }

    pub async fn update_value(pool: &PgPool, id: DbId, value: f64) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE transactions SET value = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(value)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
