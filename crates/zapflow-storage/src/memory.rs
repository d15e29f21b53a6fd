//! In-memory repositories
//!
//! Every repository shares one mutex, so conditional status updates behave
//! like the row-level updates of the PostgreSQL implementation.

use crate::models::*;
use crate::repository::{
    ApiKey, ApiKeyRepository, CampaignLogRepository, CampaignRepository, ContactListRepository,
    ContactRepository, TenantRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;
use zapflow_common::types::{
    ApiKeyId, CampaignId, ContactId, ContactListId, SubscriptionStatus, TenantId,
};
use zapflow_common::{Error, Result};

#[derive(Default)]
struct State {
    tenants: Vec<Tenant>,
    api_keys: Vec<ApiKey>,
    campaigns: Vec<Campaign>,
    contacts: Vec<Contact>,
    logs: Vec<CampaignLog>,
    lists: Vec<ContactList>,
    members: Vec<(ContactListId, ContactId)>,
    /// Campaigns whose `begin_sending` reports a storage failure
    broken_campaigns: HashSet<CampaignId>,
}

/// Shared in-memory store implementing every repository trait
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later `begin_sending` for `id` fail with a database error
    pub fn break_campaign(&self, id: CampaignId) {
        self.state().broken_campaigns.insert(id);
    }

    pub fn campaign_count(&self) -> usize {
        self.state().campaigns.len()
    }

    pub fn contact_count(&self) -> usize {
        self.state().contacts.len()
    }
}

fn set_status(campaign: &mut Campaign, status: CampaignStatus) {
    let now = Utc::now();
    campaign.status = status.to_string();
    campaign.updated_at = now;
    match status {
        CampaignStatus::Sending => campaign.started_at = Some(now),
        CampaignStatus::Completed | CampaignStatus::Failed => campaign.completed_at = Some(now),
        _ => {}
    }
}

fn in_statuses(campaign: &Campaign, from: &[CampaignStatus]) -> bool {
    campaign
        .status_enum()
        .map(|status| from.contains(&status))
        .unwrap_or(false)
}

#[async_trait]
impl TenantRepository for MemoryStore {
    async fn create(&self, input: CreateTenant) -> Result<Tenant> {
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::now_v7(),
            name: input.name,
            email: input.email,
            subscription_status: input
                .subscription_status
                .unwrap_or(SubscriptionStatus::Trial)
                .to_string(),
            trial_ends_at: input.trial_ends_at,
            created_at: now,
            updated_at: now,
        };
        self.state().tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn get(&self, id: TenantId) -> Result<Option<Tenant>> {
        Ok(self.state().tenants.iter().find(|t| t.id == id).cloned())
    }
}

#[async_trait]
impl ApiKeyRepository for MemoryStore {
    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>> {
        Ok(self
            .state()
            .api_keys
            .iter()
            .filter(|k| k.key_prefix == prefix && !k.is_expired())
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        tenant_id: TenantId,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
    ) -> Result<ApiKey> {
        let key = ApiKey {
            id: Uuid::now_v7(),
            tenant_id,
            name: name.to_string(),
            key_hash: key_hash.to_string(),
            key_prefix: key_prefix.to_string(),
            expires_at: None,
            last_used_at: None,
            created_at: Utc::now(),
        };
        self.state().api_keys.push(key.clone());
        Ok(key)
    }

    async fn update_last_used(&self, id: ApiKeyId) -> Result<()> {
        if let Some(key) = self.state().api_keys.iter_mut().find(|k| k.id == id) {
            key.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl CampaignRepository for MemoryStore {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::now_v7(),
            tenant_id: input.tenant_id,
            name: input.name,
            message: input.message,
            image_url: input.image_url,
            delay_min: input.pacing.delay_min,
            delay_max: input.pacing.delay_max,
            batch_size: input.pacing.batch_size,
            batch_delay: input.pacing.batch_delay,
            contact_list_id: input.contact_list_id,
            scheduled_at: input.scheduled_at,
            scheduled_contact_ids: Vec::new(),
            status: CampaignStatus::Draft.to_string(),
            total_contacts: 0,
            sent_count: 0,
            failed_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        self.state().campaigns.push(campaign.clone());
        Ok(campaign)
    }

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        Ok(self.state().campaigns.iter().find(|c| c.id == id).cloned())
    }

    async fn get_by_tenant(&self, tenant_id: TenantId, id: CampaignId) -> Result<Option<Campaign>> {
        Ok(self
            .state()
            .campaigns
            .iter()
            .find(|c| c.id == id && c.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self
            .state()
            .campaigns
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        campaigns.reverse();
        Ok(campaigns)
    }

    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<i64> {
        Ok(self
            .state()
            .campaigns
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .count() as i64)
    }

    async fn update_draft(
        &self,
        tenant_id: TenantId,
        id: CampaignId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>> {
        let mut state = self.state();
        let Some(campaign) = state.campaigns.iter_mut().find(|c| {
            c.id == id && c.tenant_id == tenant_id && c.status_enum() == Some(CampaignStatus::Draft)
        }) else {
            return Ok(None);
        };

        if let Some(name) = input.name {
            campaign.name = name;
        }
        if let Some(message) = input.message {
            campaign.message = message;
        }
        if input.image_url.is_some() {
            campaign.image_url = input.image_url;
        }
        if let Some(v) = input.delay_min {
            campaign.delay_min = v;
        }
        if let Some(v) = input.delay_max {
            campaign.delay_max = v;
        }
        if let Some(v) = input.batch_size {
            campaign.batch_size = v;
        }
        if let Some(v) = input.batch_delay {
            campaign.batch_delay = v;
        }
        if input.contact_list_id.is_some() {
            campaign.contact_list_id = input.contact_list_id;
        }
        if input.scheduled_at.is_some() {
            campaign.scheduled_at = input.scheduled_at;
        }
        campaign.updated_at = Utc::now();
        Ok(Some(campaign.clone()))
    }

    async fn delete(&self, tenant_id: TenantId, id: CampaignId) -> Result<bool> {
        let mut state = self.state();
        let before = state.campaigns.len();
        state
            .campaigns
            .retain(|c| !(c.id == id && c.tenant_id == tenant_id));
        if state.campaigns.len() == before {
            return Ok(false);
        }

        state.logs.retain(|l| l.campaign_id != id);
        let removed: HashSet<ContactId> = state
            .contacts
            .iter()
            .filter(|c| c.campaign_id == Some(id))
            .map(|c| c.id)
            .collect();
        state.contacts.retain(|c| !removed.contains(&c.id));
        state.logs.retain(|l| !removed.contains(&l.contact_id));
        state.members.retain(|(_, contact)| !removed.contains(contact));
        Ok(true)
    }

    async fn schedule(
        &self,
        id: CampaignId,
        scheduled_at: DateTime<Utc>,
        contact_ids: &[ContactId],
    ) -> Result<bool> {
        let mut state = self.state();
        match state
            .campaigns
            .iter_mut()
            .find(|c| c.id == id && in_statuses(c, &CampaignStatus::DISPATCHABLE))
        {
            Some(campaign) => {
                set_status(campaign, CampaignStatus::Scheduled);
                campaign.scheduled_at = Some(scheduled_at);
                campaign.scheduled_contact_ids = contact_ids.to_vec();
                campaign.total_contacts = contact_ids.len() as i32;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn begin_sending(&self, id: CampaignId, total_contacts: i32) -> Result<bool> {
        let mut state = self.state();
        if state.broken_campaigns.contains(&id) {
            return Err(Error::Database("connection reset".to_string()));
        }
        match state
            .campaigns
            .iter_mut()
            .find(|c| c.id == id && in_statuses(c, &CampaignStatus::DISPATCHABLE))
        {
            Some(campaign) => {
                set_status(campaign, CampaignStatus::Sending);
                campaign.total_contacts = total_contacts;
                campaign.sent_count = 0;
                campaign.failed_count = 0;
                campaign.error_message = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn finish(&self, id: CampaignId, outcome: &CampaignOutcome) -> Result<bool> {
        let mut state = self.state();
        match state
            .campaigns
            .iter_mut()
            .find(|c| c.id == id && in_statuses(c, &[CampaignStatus::Sending]))
        {
            Some(campaign) => {
                set_status(campaign, outcome.status);
                campaign.sent_count = outcome.sent_count;
                campaign.failed_count = outcome.failed_count;
                campaign.error_message = outcome.error_message.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_failed(
        &self,
        id: CampaignId,
        from: &[CampaignStatus],
        error_message: &str,
    ) -> Result<bool> {
        let mut state = self.state();
        match state
            .campaigns
            .iter_mut()
            .find(|c| c.id == id && in_statuses(c, from))
        {
            Some(campaign) => {
                set_status(campaign, CampaignStatus::Failed);
                campaign.error_message = Some(error_message.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let mut due: Vec<Campaign> = self
            .state()
            .campaigns
            .iter()
            .filter(|c| c.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|c| c.scheduled_at);
        Ok(due)
    }

    async fn set_total_contacts(&self, id: CampaignId, total: i32) -> Result<bool> {
        let mut state = self.state();
        match state
            .campaigns
            .iter_mut()
            .find(|c| c.id == id && in_statuses(c, &CampaignStatus::DISPATCHABLE))
        {
            Some(campaign) => {
                campaign.total_contacts = total;
                campaign.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ContactRepository for MemoryStore {
    async fn create_batch(&self, contacts: Vec<CreateContact>) -> Result<Vec<Contact>> {
        let now = Utc::now();
        let created: Vec<Contact> = contacts
            .into_iter()
            .map(|input| Contact {
                id: Uuid::now_v7(),
                tenant_id: input.tenant_id,
                campaign_id: input.campaign_id,
                name: input.name,
                phone: input.phone,
                email: input.email,
                custom_fields: input.custom_fields,
                last_campaign_sent: None,
                total_campaigns_sent: 0,
                created_at: now,
            })
            .collect();
        self.state().contacts.extend(created.iter().cloned());
        Ok(created)
    }

    async fn list(&self, tenant_id: TenantId, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let state = self.state();
        let members: Option<HashSet<ContactId>> = filter.contact_list_id.map(|list_id| {
            state
                .members
                .iter()
                .filter(|(l, _)| *l == list_id)
                .map(|(_, c)| *c)
                .collect()
        });

        Ok(state
            .contacts
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| filter.campaign_id.map_or(true, |id| c.campaign_id == Some(id)))
            .filter(|c| members.as_ref().map_or(true, |m| m.contains(&c.id)))
            .filter(|c| {
                filter.not_contacted_since.map_or(true, |since| {
                    c.last_campaign_sent.map_or(true, |sent| sent < since)
                })
            })
            .cloned()
            .collect())
    }

    async fn get_by_ids(&self, tenant_id: TenantId, ids: &[ContactId]) -> Result<Vec<Contact>> {
        let wanted: HashSet<&ContactId> = ids.iter().collect();
        Ok(self
            .state()
            .contacts
            .iter()
            .filter(|c| c.tenant_id == tenant_id && wanted.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<i64> {
        Ok(self
            .state()
            .contacts
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .count() as i64)
    }

    async fn record_sent(&self, ids: &[ContactId], at: DateTime<Utc>) -> Result<u64> {
        let wanted: HashSet<&ContactId> = ids.iter().collect();
        let mut updated = 0;
        for contact in self.state().contacts.iter_mut() {
            if wanted.contains(&contact.id) {
                contact.last_campaign_sent = Some(at);
                contact.total_campaigns_sent += 1;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, tenant_id: TenantId, id: ContactId) -> Result<bool> {
        let mut state = self.state();
        let before = state.contacts.len();
        state
            .contacts
            .retain(|c| !(c.id == id && c.tenant_id == tenant_id));
        if state.contacts.len() == before {
            return Ok(false);
        }

        let lists: Vec<ContactListId> = state
            .members
            .iter()
            .filter(|(_, c)| *c == id)
            .map(|(l, _)| *l)
            .collect();
        state.members.retain(|(_, c)| *c != id);
        state.logs.retain(|l| l.contact_id != id);
        for list in state.lists.iter_mut().filter(|l| lists.contains(&l.id)) {
            list.contact_count -= 1;
        }
        Ok(true)
    }
}

#[async_trait]
impl CampaignLogRepository for MemoryStore {
    async fn create_batch(&self, logs: Vec<CreateCampaignLog>) -> Result<u64> {
        let now = Utc::now();
        let count = logs.len() as u64;
        let mut state = self.state();
        state.logs.extend(logs.into_iter().map(|log| CampaignLog {
            id: Uuid::now_v7(),
            campaign_id: log.campaign_id,
            contact_id: log.contact_id,
            status: log.status.to_string(),
            error_message: log.error_message,
            sent_at: log.sent_at,
            created_at: now,
        }));
        Ok(count)
    }

    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignLog>> {
        Ok(self
            .state()
            .logs
            .iter()
            .filter(|l| l.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ContactListRepository for MemoryStore {
    async fn create(&self, input: CreateContactList) -> Result<ContactList> {
        let now = Utc::now();
        let list = ContactList {
            id: Uuid::now_v7(),
            tenant_id: input.tenant_id,
            name: input.name,
            description: input.description,
            color: input.color,
            contact_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.state().lists.push(list.clone());
        Ok(list)
    }

    async fn get(&self, tenant_id: TenantId, id: ContactListId) -> Result<Option<ContactList>> {
        Ok(self
            .state()
            .lists
            .iter()
            .find(|l| l.id == id && l.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<ContactList>> {
        let mut lists: Vec<ContactList> = self
            .state()
            .lists
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect();
        lists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(lists)
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        id: ContactListId,
        input: UpdateContactList,
    ) -> Result<Option<ContactList>> {
        let mut state = self.state();
        let Some(list) = state
            .lists
            .iter_mut()
            .find(|l| l.id == id && l.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        if let Some(name) = input.name {
            list.name = name;
        }
        if input.description.is_some() {
            list.description = input.description;
        }
        if input.color.is_some() {
            list.color = input.color;
        }
        list.updated_at = Utc::now();
        Ok(Some(list.clone()))
    }

    async fn delete(&self, tenant_id: TenantId, id: ContactListId) -> Result<bool> {
        let mut state = self.state();
        let before = state.lists.len();
        state
            .lists
            .retain(|l| !(l.id == id && l.tenant_id == tenant_id));
        if state.lists.len() == before {
            return Ok(false);
        }
        state.members.retain(|(l, _)| *l != id);
        for campaign in state
            .campaigns
            .iter_mut()
            .filter(|c| c.contact_list_id == Some(id))
        {
            campaign.contact_list_id = None;
        }
        Ok(true)
    }

    async fn set_members(
        &self,
        tenant_id: TenantId,
        id: ContactListId,
        contact_ids: &[ContactId],
    ) -> Result<bool> {
        let mut state = self.state();
        if !state
            .lists
            .iter()
            .any(|l| l.id == id && l.tenant_id == tenant_id)
        {
            return Ok(false);
        }

        let owned: HashSet<ContactId> = state
            .contacts
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .map(|c| c.id)
            .collect();
        let mut seen = HashSet::new();
        let members: Vec<ContactId> = contact_ids
            .iter()
            .copied()
            .filter(|c| owned.contains(c) && seen.insert(*c))
            .collect();

        state.members.retain(|(l, _)| *l != id);
        state.members.extend(members.iter().map(|c| (id, *c)));
        if let Some(list) = state.lists.iter_mut().find(|l| l.id == id) {
            list.contact_count = members.len() as i32;
            list.updated_at = Utc::now();
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_campaign(tenant_id: TenantId) -> CreateCampaign {
        CreateCampaign {
            tenant_id,
            name: "Launch".to_string(),
            message: "Hi [nome]".to_string(),
            image_url: None,
            pacing: Pacing::default(),
            contact_list_id: None,
            scheduled_at: None,
        }
    }

    fn new_contact(tenant_id: TenantId, name: &str) -> CreateContact {
        CreateContact {
            tenant_id,
            campaign_id: None,
            name: name.to_string(),
            phone: "5511999990000".to_string(),
            email: None,
            custom_fields: None,
        }
    }

    #[tokio::test]
    async fn test_begin_sending_only_once() {
        let store = MemoryStore::new();
        let tenant = Uuid::now_v7();
        let campaign = CampaignRepository::create(&store, new_campaign(tenant))
            .await
            .unwrap();

        assert!(store.begin_sending(campaign.id, 3).await.unwrap());
        assert!(!store.begin_sending(campaign.id, 3).await.unwrap());

        let current = CampaignRepository::get(&store, campaign.id).await.unwrap().unwrap();
        assert_eq!(current.status_enum(), Some(CampaignStatus::Sending));
        assert!(current.started_at.is_some());
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let store = MemoryStore::new();
        let tenant = Uuid::now_v7();
        let campaign = CampaignRepository::create(&store, new_campaign(tenant))
            .await
            .unwrap();
        store.begin_sending(campaign.id, 1).await.unwrap();

        let outcome = CampaignOutcome {
            status: CampaignStatus::Completed,
            sent_count: 1,
            failed_count: 0,
            error_message: None,
        };
        assert!(store.finish(campaign.id, &outcome).await.unwrap());
        assert!(!store.finish(campaign.id, &outcome).await.unwrap());
        assert!(!store
            .mark_failed(campaign.id, &CampaignStatus::DISPATCHABLE, "late")
            .await
            .unwrap());
        assert!(!store.schedule(campaign.id, Utc::now(), &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_draft_refuses_sent_campaign() {
        let store = MemoryStore::new();
        let tenant = Uuid::now_v7();
        let campaign = CampaignRepository::create(&store, new_campaign(tenant))
            .await
            .unwrap();

        let update = UpdateCampaign {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let updated = store
            .update_draft(tenant, campaign.id, update.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Renamed");

        store.begin_sending(campaign.id, 0).await.unwrap();
        assert!(store
            .update_draft(tenant, campaign.id, update)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_campaign_cascades() {
        let store = MemoryStore::new();
        let tenant = Uuid::now_v7();
        let campaign = CampaignRepository::create(&store, new_campaign(tenant))
            .await
            .unwrap();

        let mut linked = new_contact(tenant, "Ana");
        linked.campaign_id = Some(campaign.id);
        let created =
            ContactRepository::create_batch(&store, vec![linked, new_contact(tenant, "Bruno")])
                .await
                .unwrap();

        CampaignLogRepository::create_batch(
            &store,
            vec![CreateCampaignLog {
                campaign_id: campaign.id,
                contact_id: created[0].id,
                status: CampaignLogStatus::Sent,
                error_message: None,
                sent_at: Some(Utc::now()),
            }],
        )
        .await
        .unwrap();

        assert!(CampaignRepository::delete(&store, tenant, campaign.id).await.unwrap());
        assert_eq!(store.campaign_count(), 0);
        assert_eq!(store.contact_count(), 1);
        assert!(store.list_by_campaign(campaign.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_contact_filters() {
        let store = MemoryStore::new();
        let tenant = Uuid::now_v7();
        let created = ContactRepository::create_batch(
            &store,
            vec![
                new_contact(tenant, "Ana"),
                new_contact(tenant, "Bruno"),
                new_contact(Uuid::now_v7(), "Other tenant"),
            ],
        )
        .await
        .unwrap();

        store.record_sent(&[created[0].id], Utc::now()).await.unwrap();

        let all = store.list(tenant, &ContactFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let fresh = store
            .list(
                tenant,
                &ContactFilter {
                    not_contacted_since: Some(Utc::now() - chrono::Duration::days(7)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].name, "Bruno");

        let list = ContactListRepository::create(
            &store,
            CreateContactList {
                tenant_id: tenant,
                name: "VIP".to_string(),
                description: None,
                color: Some("#22c55e".to_string()),
            },
        )
        .await
        .unwrap();
        store
            .set_members(tenant, list.id, &[created[1].id, created[2].id])
            .await
            .unwrap();

        let members = store
            .list(
                tenant,
                &ContactFilter {
                    contact_list_id: Some(list.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, created[1].id);

        let list = ContactListRepository::get(&store, tenant, list.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(list.contact_count, 1);
    }
}
