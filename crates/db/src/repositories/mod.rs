pub mod campaign_repo;
pub mod link_repo;
pub mod transaction_repo;

pub use campaign_repo::CampaignRepo;
pub use link_repo::LinkRepo;
pub use transaction_repo::TransactionRepo;
