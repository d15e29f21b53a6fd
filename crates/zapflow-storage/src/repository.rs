//! Repository layer for data access

pub mod api_keys;
pub mod campaign_logs;
pub mod campaigns;
pub mod contact_lists;
pub mod contacts;
pub mod tenants;

pub use api_keys::{ApiKey, ApiKeyRepository, DbApiKeyRepository};
pub use campaign_logs::{CampaignLogRepository, DbCampaignLogRepository};
pub use campaigns::{CampaignRepository, DbCampaignRepository};
pub use contact_lists::{ContactListRepository, DbContactListRepository};
pub use contacts::{ContactRepository, DbContactRepository};
pub use tenants::{DbTenantRepository, TenantRepository};
