//! Trial Quota Guard - Count-based admission checks for trial tenants
//!
//! Counts and inserts are not one transaction, so two concurrent imports
//! of the same trial tenant can both pass.

use serde::{Deserialize, Serialize};
use tracing::debug;
use zapflow_common::config::QuotaConfig;
use zapflow_common::types::{SubscriptionStatus, TenantId};
use zapflow_common::{Error, Result};
use zapflow_storage::{CampaignRepository, ContactRepository, Store, TenantRepository};

/// Current usage against the trial limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub subscription: SubscriptionStatus,
    pub trial_tier: bool,
    pub campaigns: i64,
    pub contacts: i64,
    /// Limits only apply when `trial_tier` is set
    pub max_campaigns: i64,
    pub max_contacts: i64,
}

/// Trial Quota Guard
pub struct TrialQuotaGuard {
    store: Store,
    limits: QuotaConfig,
}

impl TrialQuotaGuard {
    /// Create a new quota guard
    pub fn new(store: Store, limits: QuotaConfig) -> Self {
        Self { store, limits }
    }

    /// Subscription of the tenant; unknown tenants are treated as trial
    pub async fn subscription(&self, tenant_id: TenantId) -> Result<SubscriptionStatus> {
        Ok(self
            .store
            .tenants
            .get(tenant_id)
            .await?
            .map(|t| t.subscription())
            .unwrap_or(SubscriptionStatus::Trial))
    }

    /// Reject a new campaign once a trial tenant owns the maximum
    pub async fn check_campaign_creation(&self, tenant_id: TenantId) -> Result<()> {
        if !self.subscription(tenant_id).await?.is_trial_tier() {
            return Ok(());
        }

        let existing = self.store.campaigns.count_by_tenant(tenant_id).await?;
        debug!(%tenant_id, existing, "Checking trial campaign quota");

        if existing >= self.limits.trial_max_campaigns {
            return Err(Error::QuotaExceeded(format!(
                "Trial accounts can create only {} campaign(s). Upgrade your plan to create more campaigns.",
                self.limits.trial_max_campaigns
            )));
        }
        Ok(())
    }

    /// Reject an import of `incoming` contacts as a whole when it would
    /// take a trial tenant over the contact limit
    pub async fn check_contact_import(&self, tenant_id: TenantId, incoming: usize) -> Result<()> {
        if !self.subscription(tenant_id).await?.is_trial_tier() {
            return Ok(());
        }

        let max = self.limits.trial_max_contacts;
        let incoming = incoming as i64;
        if incoming > max {
            return Err(Error::QuotaExceeded(format!(
                "Trial accounts can import at most {} contacts. This file has {} valid contacts.",
                max, incoming
            )));
        }

        let existing = self.store.contacts.count_by_tenant(tenant_id).await?;
        debug!(%tenant_id, existing, incoming, "Checking trial contact quota");

        if existing + incoming > max {
            return Err(Error::QuotaExceeded(format!(
                "Trial accounts can have at most {} contacts. You already have {} and this import adds {}.",
                max, existing, incoming
            )));
        }
        Ok(())
    }

    /// Usage summary for display
    pub async fn usage(&self, tenant_id: TenantId) -> Result<QuotaUsage> {
        let subscription = self.subscription(tenant_id).await?;
        Ok(QuotaUsage {
            subscription,
            trial_tier: subscription.is_trial_tier(),
            campaigns: self.store.campaigns.count_by_tenant(tenant_id).await?,
            contacts: self.store.contacts.count_by_tenant(tenant_id).await?,
            max_campaigns: self.limits.trial_max_campaigns,
            max_contacts: self.limits.trial_max_contacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;
    use zapflow_storage::memory::MemoryStore;
    use zapflow_storage::models::{CreateCampaign, CreateContact, CreateTenant, Pacing};

    async fn setup(status: SubscriptionStatus) -> (Store, TrialQuotaGuard, TenantId) {
        let store = Store::memory(Arc::new(MemoryStore::new()));
        let tenant = store
            .tenants
            .create(CreateTenant {
                name: "Loja".to_string(),
                email: "loja@example.com".to_string(),
                subscription_status: Some(status),
                trial_ends_at: None,
            })
            .await
            .unwrap();
        let guard = TrialQuotaGuard::new(store.clone(), QuotaConfig::default());
        (store, guard, tenant.id)
    }

    async fn add_contacts(store: &Store, tenant_id: TenantId, n: usize) {
        let input = (0..n)
            .map(|i| CreateContact {
                tenant_id,
                campaign_id: None,
                name: format!("C{}", i),
                phone: format!("55119888{:05}", i),
                email: None,
                custom_fields: None,
            })
            .collect();
        store.contacts.create_batch(input).await.unwrap();
    }

    #[tokio::test]
    async fn test_trial_allows_one_campaign() {
        let (store, guard, tenant) = setup(SubscriptionStatus::Trial).await;
        guard.check_campaign_creation(tenant).await.unwrap();

        store
            .campaigns
            .create(CreateCampaign {
                tenant_id: tenant,
                name: "First".to_string(),
                message: "Hi".to_string(),
                image_url: None,
                pacing: Pacing::default(),
                contact_list_id: None,
                scheduled_at: None,
            })
            .await
            .unwrap();

        let err = guard.check_campaign_creation(tenant).await.unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded(_)));
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_active_subscription_is_unlimited() {
        let (store, guard, tenant) = setup(SubscriptionStatus::Active).await;
        add_contacts(&store, tenant, 30).await;
        guard.check_contact_import(tenant, 500).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_subscription_gets_trial_limits() {
        let (_store, guard, tenant) = setup(SubscriptionStatus::Cancelled).await;
        assert!(guard.check_contact_import(tenant, 21).await.is_err());
    }

    #[tokio::test]
    async fn test_import_limits() {
        let (store, guard, tenant) = setup(SubscriptionStatus::Trial).await;

        let err = guard.check_contact_import(tenant, 21).await.unwrap_err();
        assert!(err.to_string().contains("21 valid contacts"));

        guard.check_contact_import(tenant, 20).await.unwrap();

        add_contacts(&store, tenant, 15).await;
        guard.check_contact_import(tenant, 5).await.unwrap();
        let err = guard.check_contact_import(tenant, 6).await.unwrap_err();
        assert!(err.to_string().contains("already have 15"));

        let usage = guard.usage(tenant).await.unwrap();
        assert_eq!(usage.contacts, 15);
        assert!(usage.trial_tier);
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_trial() {
        let (_store, guard, _) = setup(SubscriptionStatus::Active).await;
        assert_eq!(
            guard.subscription(Uuid::now_v7()).await.unwrap(),
            SubscriptionStatus::Trial
        );
    }
}
