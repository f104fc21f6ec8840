//! Request handlers.
//!
//! Handlers delegate to the [`ChangeCoordinator`](incentive_engine::ChangeCoordinator)
//! held in [`AppState`](crate::state::AppState) and map errors via
//! [`AppError`](crate::error::AppError).

pub mod progress;
