//! Domain model and pure progress logic for sales incentive campaigns.
//!
//! Nothing in this crate performs I/O. Campaigns and their linked
//! transactions are loaded by a [`store::ProgressStore`] implementation
//! and handed to the pure functions in [`evaluator`], [`aggregator`] and
//! [`progress`].

pub mod aggregator;
pub mod campaign;
pub mod error;
pub mod evaluator;
pub mod progress;
pub mod store;
pub mod types;
