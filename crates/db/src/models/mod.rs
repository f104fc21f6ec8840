pub mod campaign;
pub mod link;
pub mod transaction;
