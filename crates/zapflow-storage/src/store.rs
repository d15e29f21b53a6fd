//! Repository bundle shared by services and handlers

use crate::db::DatabasePool;
use crate::repository::*;
use std::sync::Arc;

/// All repositories behind trait objects
#[derive(Clone)]
pub struct Store {
    pub tenants: Arc<dyn TenantRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub campaign_logs: Arc<dyn CampaignLogRepository>,
    pub contact_lists: Arc<dyn ContactListRepository>,
}

impl Store {
    /// PostgreSQL-backed repositories
    pub fn postgres(pool: DatabasePool) -> Self {
        Self {
            tenants: Arc::new(DbTenantRepository::new(pool.clone())),
            api_keys: Arc::new(DbApiKeyRepository::new(pool.clone())),
            campaigns: Arc::new(DbCampaignRepository::new(pool.clone())),
            contacts: Arc::new(DbContactRepository::new(pool.clone())),
            campaign_logs: Arc::new(DbCampaignLogRepository::new(pool.clone())),
            contact_lists: Arc::new(DbContactListRepository::new(pool)),
        }
    }

    /// Every repository backed by the same in-memory store
    #[cfg(any(test, feature = "test-util"))]
    pub fn memory(store: Arc<crate::memory::MemoryStore>) -> Self {
        Self {
            tenants: store.clone(),
            api_keys: store.clone(),
            campaigns: store.clone(),
            contacts: store.clone(),
            campaign_logs: store.clone(),
            contact_lists: store,
        }
    }
}
