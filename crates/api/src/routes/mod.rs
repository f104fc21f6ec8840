pub mod health;
pub mod progress;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /campaigns/{id}/progress        current progress (GET)
/// /campaigns/{id}/progress/ws     live progress stream (WebSocket)
/// /progress/recalculate           batch recalculation (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(progress::router())
}
