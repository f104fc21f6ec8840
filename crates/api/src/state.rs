use std::sync::Arc;

use incentive_engine::ChangeCoordinator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; the coordinator shares its state between clones.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Computes, caches and fans out campaign progress.
    pub coordinator: ChangeCoordinator,
}
