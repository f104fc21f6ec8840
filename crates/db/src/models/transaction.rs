//! Transaction (policy sale) rows and DTOs.

use incentive_core::types::{DbId, Timestamp};
use serde::Deserialize;
use sqlx::FromRow;

/// A row from the `transactions` table.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: DbId,
    pub category: String,
    pub value: f64,
    pub contract_type: String,
    pub registered_at: Timestamp,
}

/// DTO for inserting a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub category: String,
    pub value: f64,
    pub contract_type: String,
    pub registered_at: Option<Timestamp>,
}
