//! Campaign link rows.

use incentive_core::campaign::{ContractType, Link, LinkedTransaction, Transaction};
use incentive_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from `campaign_links`.
#[derive(Debug, Clone, FromRow)]
pub struct LinkRow {
    pub id: DbId,
    pub campaign_id: DbId,
    pub transaction_id: DbId,
    pub is_active: bool,
    pub linked_at: Timestamp,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Link {
            id: row.id,
            campaign_id: row.campaign_id,
            transaction_id: row.transaction_id,
            is_active: row.is_active,
            linked_at: row.linked_at,
        }
    }
}

/// A link left-joined with its transaction.
///
/// The `tx_*` columns are all `NULL` when the transaction row is missing.
#[derive(Debug, Clone, FromRow)]
pub struct LinkedTransactionRow {
    pub id: DbId,
    pub campaign_id: DbId,
    pub transaction_id: DbId,
    pub is_active: bool,
    pub linked_at: Timestamp,
    pub tx_id: Option<DbId>,
    pub tx_category: Option<String>,
    pub tx_value: Option<f64>,
    pub tx_contract_type: Option<String>,
    pub tx_registered_at: Option<Timestamp>,
}

impl From<LinkedTransactionRow> for LinkedTransaction {
    /// A transaction with an unknown contract type is treated as unresolved.
    fn from(row: LinkedTransactionRow) -> Self {
        let transaction = match (
            row.tx_id,
            row.tx_category,
            row.tx_value,
            row.tx_contract_type,
            row.tx_registered_at,
        ) {
            (Some(id), Some(category), Some(value), Some(contract_type), Some(registered_at)) => {
                match ContractType::from_str_value(&contract_type) {
                    Ok(contract_type) => Some(Transaction {
                        id,
                        category,
                        value,
                        contract_type,
                        registered_at,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            transaction_id = id,
                            error = %e,
                            "Unreadable transaction, link ignored"
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        LinkedTransaction {
            link: Link {
                id: row.id,
                campaign_id: row.campaign_id,
                transaction_id: row.transaction_id,
                is_active: row.is_active,
                linked_at: row.linked_at,
            },
            transaction,
        }
    }
}
