//! Route definitions for campaign progress.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::progress;
use crate::state::AppState;
use crate::ws;

/// ```text
/// GET    /campaigns/{id}/progress       -> get_progress
/// GET    /campaigns/{id}/progress/ws    -> progress_ws
/// POST   /progress/recalculate          -> recalculate
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/campaigns/{id}/progress", get(progress::get_progress))
        .route("/campaigns/{id}/progress/ws", get(ws::progress_ws))
        .route("/progress/recalculate", post(progress::recalculate))
}
