//! Campaign rows and DTOs.

use incentive_core::campaign::{
    Campaign, CampaignCriteria, CampaignKind, CampaignStatus, TargetType,
};
use incentive_core::error::CoreError;
use incentive_core::types::{DbId, Timestamp};
use serde::Deserialize;
use sqlx::FromRow;

/// A row from the `campaigns` table.
#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub name: String,
    pub kind: String,
    pub target_type: String,
    pub target: f64,
    /// Either a JSON array or a JSON string holding one.
    pub criteria: Option<serde_json::Value>,
    pub status: String,
    pub accepted_at: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = CoreError;

    /// Validates enum columns and the criteria payload.
    ///
    /// Malformed criteria are not an error here: they are carried as
    /// [`CampaignCriteria::Malformed`] so the calculation can fall back.
    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        Ok(Campaign {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            kind: CampaignKind::from_str_value(&row.kind)?,
            target_type: TargetType::from_str_value(&row.target_type)?,
            target: row.target,
            criteria: CampaignCriteria::from_payload(row.criteria.as_ref()),
            status: CampaignStatus::from_str_value(&row.status)?,
            accepted_at: row.accepted_at,
            is_active: row.is_active,
        })
    }
}

/// DTO for inserting a campaign.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaign {
    pub user_id: Option<DbId>,
    pub name: String,
    pub kind: String,
    pub target_type: Option<String>,
    pub target: Option<f64>,
    pub criteria: Option<serde_json::Value>,
    pub status: Option<String>,
    pub accepted_at: Option<Timestamp>,
}
