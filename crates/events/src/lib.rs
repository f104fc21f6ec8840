//! Change streams feeding the progress engine.
//!
//! - [`EventBus`]: in-process publish/subscribe hub for [`ChangeEvent`]s,
//!   backed by `tokio::sync::broadcast`.
//! - [`PgChangeFeed`]: background service that turns Postgres
//!   `NOTIFY` messages on the three change channels into bus events.

pub mod bus;
pub mod feed;

pub use bus::{ChangeEvent, ChangeTopic, EventBus};
pub use feed::PgChangeFeed;
