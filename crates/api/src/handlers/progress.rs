//! Handlers for campaign progress.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use incentive_core::progress::ProgressSnapshot;
use incentive_core::store::CampaignFilter;
use incentive_core::types::DbId;
use incentive_engine::RecalcSummary;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProgressQuery {
    /// Return the last published snapshot when there is one instead of
    /// computing afresh.
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecalculateRequest {
    pub user_id: Option<DbId>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl RecalculateRequest {
    fn into_filter(self) -> AppResult<CampaignFilter> {
        if let Some(user_id) = self.user_id {
            if user_id <= 0 {
                return Err(AppError::BadRequest(format!(
                    "user_id must be positive, got {user_id}"
                )));
            }
        }
        Ok(CampaignFilter {
            user_id: self.user_id,
            include_inactive: self.include_inactive,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/campaigns/{id}/progress
///
/// Computes the campaign's progress and publishes it to subscribers.
/// With `?cached=true` the last published snapshot is returned if present.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
    Query(query): Query<ProgressQuery>,
) -> AppResult<Json<DataResponse<ProgressSnapshot>>> {
    if query.cached {
        if let Some(snapshot) = state.coordinator.latest(campaign_id) {
            return Ok(Json(DataResponse { data: snapshot }));
        }
    }

    let snapshot = state.coordinator.compute_progress(campaign_id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/v1/progress/recalculate
///
/// Recomputes every campaign matched by the optional filter. An empty
/// body recomputes all active campaigns.
pub async fn recalculate(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<DataResponse<RecalcSummary>>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RecalculateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid recalculation request: {e}")))?
    };
    let filter = request.into_filter()?;
    let summary = state.coordinator.recalculate_all(&filter).await?;
    Ok(Json(DataResponse { data: summary }))
}
