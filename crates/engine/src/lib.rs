//! Campaign progress engine.
//!
//! - [`ProgressCalculator`] loads a campaign and its linked transactions
//!   and produces a [`ProgressSnapshot`](incentive_core::progress::ProgressSnapshot).
//! - [`ChangeCoordinator`] runs at most one computation per campaign at a
//!   time, coalesces bursts of changes, discards stale results and fans
//!   snapshots out to subscribers.
//! - [`ChangeRouter`] resolves raw change events to campaign ids.
//! - [`MemoryStore`] is an in-memory store for tests and local runs.

pub mod calculator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod recalc;
pub mod router;

pub use calculator::ProgressCalculator;
pub use config::EngineConfig;
pub use coordinator::{
    CallbackSubscription, ChangeCoordinator, Phase, SlotStatus, SnapshotSubscription,
};
pub use error::ProgressError;
pub use memory::MemoryStore;
pub use recalc::RecalcSummary;
pub use router::ChangeRouter;
