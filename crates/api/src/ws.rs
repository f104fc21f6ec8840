//! Live progress stream over WebSocket.
//!
//! Each connection subscribes to one campaign on the
//! [`ChangeCoordinator`] and receives every published snapshot as a JSON
//! text frame, starting with the last published one.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use incentive_core::error::CoreError;
use incentive_core::types::DbId;
use incentive_engine::{ChangeCoordinator, ProgressError};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Interval between keep-alive pings.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// GET /api/v1/campaigns/{id}/progress/ws
///
/// Rejects unknown campaigns with 404 before upgrading.
pub async fn progress_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Response> {
    let campaign = state
        .coordinator
        .store()
        .get_campaign(campaign_id)
        .await
        .map_err(ProgressError::from)?;
    if campaign.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Campaign",
            id: campaign_id,
        }));
    }

    let coordinator = state.coordinator.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, coordinator, campaign_id)))
}

/// Forward snapshots to the socket until either side closes.
async fn handle_socket(socket: WebSocket, coordinator: ChangeCoordinator, campaign_id: DbId) {
    let mut subscription = coordinator.subscribe(campaign_id);
    if coordinator.latest(campaign_id).is_none() {
        coordinator.notify(campaign_id);
    }
    tracing::info!(campaign_id, "Progress stream connected");

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await;
        loop {
            let message = tokio::select! {
                snapshot = subscription.recv() => match snapshot {
                    Some(snapshot) => match serde_json::to_string(&snapshot) {
                        Ok(payload) => Message::Text(payload.into()),
                        Err(e) => {
                            tracing::error!(campaign_id, error = %e, "Failed to encode snapshot");
                            continue;
                        }
                    },
                    None => break,
                },
                _ = ping.tick() => Message::Ping(Default::default()),
            };
            if sink.send(message).await.is_err() {
                tracing::debug!(campaign_id, "Progress stream sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => tracing::trace!(campaign_id, "Pong received"),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(campaign_id, error = %e, "Progress stream receive error");
                break;
            }
        }
    }

    send_task.abort();
    tracing::info!(campaign_id, "Progress stream disconnected");
}
