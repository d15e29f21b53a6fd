//! Campaign Service - Tenant-facing campaign, contact and list operations

use super::dispatcher::{CampaignDispatcher, DispatchSummary, NO_CONTACTS_SELECTED};
use crate::gateway::MessagingGateway;
use crate::import::parse_contacts;
use crate::quota::TrialQuotaGuard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zapflow_common::types::{CampaignId, ContactId, ContactListId, TenantId};
use zapflow_common::{Error, Result};
use zapflow_storage::models::{
    Campaign, CampaignLog, CampaignStatus, Contact, ContactFilter, ContactList, CreateCampaign,
    CreateContact, CreateContactList, Pacing, UpdateCampaign, UpdateContactList,
};
use zapflow_storage::{
    CampaignLogRepository, CampaignRepository, ContactListRepository, ContactRepository, Store,
};

/// Error shown when an immediate send finds the channel offline
pub const NOT_CONNECTED: &str = "WhatsApp not connected. Please scan the QR code first.";

const NO_VALID_CONTACTS: &str = "No valid contacts found";

/// New campaign request; pacing fields left out take the defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub delay_min: Option<i32>,
    #[serde(default)]
    pub delay_max: Option<i32>,
    #[serde(default)]
    pub batch_size: Option<i32>,
    #[serde(default)]
    pub batch_delay: Option<i32>,
    #[serde(default)]
    pub contact_list_id: Option<ContactListId>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewCampaign {
    fn pacing(&self) -> Pacing {
        let defaults = Pacing::default();
        Pacing {
            delay_min: self.delay_min.unwrap_or(defaults.delay_min),
            delay_max: self.delay_max.unwrap_or(defaults.delay_max),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            batch_delay: self.batch_delay.unwrap_or(defaults.batch_delay),
        }
    }
}

/// What a send request did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Deferred to the scheduler
    Scheduled {
        campaign_id: CampaignId,
        scheduled_at: DateTime<Utc>,
        contacts: usize,
    },
    /// Sent right away
    Dispatched(DispatchSummary),
}

/// Result of a spreadsheet import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Contacts created
    pub total: usize,
    pub invalid: usize,
    pub contacts: Vec<Contact>,
}

/// Contacts a send goes to: `contact_ids` when given, else the members of
/// the campaign's contact list, else every contact of the tenant
pub(crate) async fn resolve_targets(
    store: &Store,
    campaign: &Campaign,
    contact_ids: &[ContactId],
) -> Result<Vec<Contact>> {
    let tenant_id = campaign.tenant_id;
    if !contact_ids.is_empty() {
        return store.contacts.get_by_ids(tenant_id, contact_ids).await;
    }

    let filter = ContactFilter {
        contact_list_id: campaign.contact_list_id,
        ..Default::default()
    };
    store.contacts.list(tenant_id, &filter).await
}

fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Campaign Service
pub struct CampaignService {
    store: Store,
    gateway: Arc<dyn MessagingGateway>,
    dispatcher: Arc<CampaignDispatcher>,
    quota: Arc<TrialQuotaGuard>,
}

impl CampaignService {
    /// Create a new campaign service
    pub fn new(
        store: Store,
        gateway: Arc<dyn MessagingGateway>,
        dispatcher: Arc<CampaignDispatcher>,
        quota: Arc<TrialQuotaGuard>,
    ) -> Self {
        Self {
            store,
            gateway,
            dispatcher,
            quota,
        }
    }

    // ---- campaigns ----

    pub async fn create_campaign(&self, tenant_id: TenantId, input: NewCampaign) -> Result<Campaign> {
        require_text(&input.name, "Campaign name")?;
        require_text(&input.message, "Message")?;
        let pacing = input.pacing();
        pacing.validate().map_err(Error::Validation)?;

        if let Some(list_id) = input.contact_list_id {
            self.get_contact_list(tenant_id, list_id).await?;
        }

        self.quota.check_campaign_creation(tenant_id).await?;

        let campaign = self
            .store
            .campaigns
            .create(CreateCampaign {
                tenant_id,
                name: input.name.trim().to_string(),
                message: input.message,
                image_url: input.image_url.filter(|u| !u.trim().is_empty()),
                pacing,
                contact_list_id: input.contact_list_id,
                scheduled_at: input.scheduled_at,
            })
            .await?;

        info!(campaign_id = %campaign.id, %tenant_id, "Campaign created");
        Ok(campaign)
    }

    pub async fn get_campaign(&self, tenant_id: TenantId, id: CampaignId) -> Result<Campaign> {
        self.store
            .campaigns
            .get_by_tenant(tenant_id, id)
            .await?
            .ok_or_else(|| Error::NotFound("Campaign not found".to_string()))
    }

    pub async fn list_campaigns(&self, tenant_id: TenantId) -> Result<Vec<Campaign>> {
        self.store.campaigns.list_by_tenant(tenant_id).await
    }

    /// Edit a draft campaign
    pub async fn update_campaign(
        &self,
        tenant_id: TenantId,
        id: CampaignId,
        input: UpdateCampaign,
    ) -> Result<Campaign> {
        let current = self.get_campaign(tenant_id, id).await?;
        if current.status_enum() != Some(CampaignStatus::Draft) {
            return Err(Error::InvalidState(
                "Only draft campaigns can be edited".to_string(),
            ));
        }

        if let Some(name) = &input.name {
            require_text(name, "Campaign name")?;
        }
        if let Some(message) = &input.message {
            require_text(message, "Message")?;
        }

        let current_pacing = current.pacing();
        let pacing = Pacing {
            delay_min: input.delay_min.unwrap_or(current_pacing.delay_min),
            delay_max: input.delay_max.unwrap_or(current_pacing.delay_max),
            batch_size: input.batch_size.unwrap_or(current_pacing.batch_size),
            batch_delay: input.batch_delay.unwrap_or(current_pacing.batch_delay),
        };
        pacing.validate().map_err(Error::Validation)?;

        if let Some(list_id) = input.contact_list_id {
            self.get_contact_list(tenant_id, list_id).await?;
        }

        self.store
            .campaigns
            .update_draft(tenant_id, id, input)
            .await?
            .ok_or_else(|| Error::InvalidState("Only draft campaigns can be edited".to_string()))
    }

    /// Delete a campaign with its logs and imported contacts
    pub async fn delete_campaign(&self, tenant_id: TenantId, id: CampaignId) -> Result<()> {
        let campaign = self.get_campaign(tenant_id, id).await?;
        if campaign.status_enum() == Some(CampaignStatus::Sending) {
            return Err(Error::InvalidState(
                "Campaign is being sent and cannot be deleted".to_string(),
            ));
        }

        if !self.store.campaigns.delete(tenant_id, id).await? {
            return Err(Error::NotFound("Campaign not found".to_string()));
        }
        info!(campaign_id = %id, %tenant_id, "Campaign deleted");
        Ok(())
    }

    pub async fn campaign_logs(&self, tenant_id: TenantId, id: CampaignId) -> Result<Vec<CampaignLog>> {
        let campaign = self.get_campaign(tenant_id, id).await?;
        self.store.campaign_logs.list_by_campaign(campaign.id).await
    }

    /// Send a campaign now, or defer it when its `scheduled_at` is in the
    /// future.
    ///
    /// Targets are, in order of precedence: `contact_ids`, the members of
    /// the campaign's contact list, every contact of the tenant.
    pub async fn send_campaign(
        &self,
        tenant_id: TenantId,
        id: CampaignId,
        contact_ids: Option<Vec<ContactId>>,
    ) -> Result<SendOutcome> {
        let campaign = self.get_campaign(tenant_id, id).await?;
        match campaign.status_enum() {
            Some(status) if CampaignStatus::DISPATCHABLE.contains(&status) => {}
            _ => {
                return Err(Error::InvalidState(format!(
                    "Campaign cannot be sent while {}",
                    campaign.status
                )))
            }
        }

        let explicit = contact_ids.unwrap_or_default();
        let contacts = resolve_targets(&self.store, &campaign, &explicit).await?;
        if contacts.is_empty() {
            return Err(Error::Validation(NO_CONTACTS_SELECTED.to_string()));
        }

        let now = Utc::now();
        if let Some(scheduled_at) = campaign.scheduled_at.filter(|at| *at > now) {
            // Only explicit ids are kept; list and tenant-wide targets are
            // resolved again when the campaign comes due
            if !self.store.campaigns.schedule(id, scheduled_at, &explicit).await? {
                return Err(Error::InvalidState(
                    "Campaign is already being sent".to_string(),
                ));
            }
            info!(
                campaign_id = %id,
                %tenant_id,
                %scheduled_at,
                contacts = contacts.len(),
                "Campaign scheduled"
            );
            return Ok(SendOutcome::Scheduled {
                campaign_id: id,
                scheduled_at,
                contacts: contacts.len(),
            });
        }

        if !self.gateway.connection_status(tenant_id).await?.connected {
            return Err(Error::GatewayNotConnected(NOT_CONNECTED.to_string()));
        }

        let summary = self.dispatcher.dispatch(&campaign, &contacts).await?;
        Ok(SendOutcome::Dispatched(summary))
    }

    // ---- contacts ----

    /// Import a CSV file, optionally linking the contacts to a campaign
    pub async fn import_contacts(
        &self,
        tenant_id: TenantId,
        data: &[u8],
        campaign_id: Option<CampaignId>,
    ) -> Result<ImportSummary> {
        if let Some(id) = campaign_id {
            let campaign = self.get_campaign(tenant_id, id).await?;
            let open = campaign
                .status_enum()
                .is_some_and(|status| CampaignStatus::DISPATCHABLE.contains(&status));
            if !open {
                return Err(Error::InvalidState(format!(
                    "Contacts cannot be added to a campaign while {}",
                    campaign.status
                )));
            }
        }

        let parsed = parse_contacts(data)?;
        if parsed.contacts.is_empty() {
            return Err(Error::Validation(NO_VALID_CONTACTS.to_string()));
        }

        self.quota
            .check_contact_import(tenant_id, parsed.contacts.len())
            .await?;

        let input = parsed
            .contacts
            .into_iter()
            .map(|c| CreateContact {
                tenant_id,
                campaign_id,
                name: c.name,
                phone: c.phone,
                email: c.email,
                custom_fields: if c.custom_fields.is_empty() {
                    None
                } else {
                    Some(serde_json::Value::Object(c.custom_fields))
                },
            })
            .collect();
        let contacts = self.store.contacts.create_batch(input).await?;

        if let Some(id) = campaign_id {
            let total = i32::try_from(contacts.len()).unwrap_or(i32::MAX);
            if !self.store.campaigns.set_total_contacts(id, total).await? {
                warn!(campaign_id = %id, "Campaign left draft during import, total unchanged");
            }
        }

        info!(
            %tenant_id,
            imported = contacts.len(),
            invalid = parsed.invalid,
            "Contacts imported"
        );

        Ok(ImportSummary {
            total: contacts.len(),
            invalid: parsed.invalid,
            contacts,
        })
    }

    pub async fn list_contacts(&self, tenant_id: TenantId, filter: &ContactFilter) -> Result<Vec<Contact>> {
        self.store.contacts.list(tenant_id, filter).await
    }

    pub async fn delete_contact(&self, tenant_id: TenantId, id: ContactId) -> Result<()> {
        if !self.store.contacts.delete(tenant_id, id).await? {
            return Err(Error::NotFound("Contact not found".to_string()));
        }
        Ok(())
    }

    // ---- contact lists ----

    pub async fn create_contact_list(
        &self,
        tenant_id: TenantId,
        name: String,
        description: Option<String>,
        color: Option<String>,
    ) -> Result<ContactList> {
        require_text(&name, "List name")?;
        self.store
            .contact_lists
            .create(CreateContactList {
                tenant_id,
                name: name.trim().to_string(),
                description,
                color,
            })
            .await
    }

    pub async fn get_contact_list(&self, tenant_id: TenantId, id: ContactListId) -> Result<ContactList> {
        self.store
            .contact_lists
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| Error::NotFound("Contact list not found".to_string()))
    }

    pub async fn list_contact_lists(&self, tenant_id: TenantId) -> Result<Vec<ContactList>> {
        self.store.contact_lists.list_by_tenant(tenant_id).await
    }

    pub async fn update_contact_list(
        &self,
        tenant_id: TenantId,
        id: ContactListId,
        input: UpdateContactList,
    ) -> Result<ContactList> {
        if let Some(name) = &input.name {
            require_text(name, "List name")?;
        }
        self.store
            .contact_lists
            .update(tenant_id, id, input)
            .await?
            .ok_or_else(|| Error::NotFound("Contact list not found".to_string()))
    }

    pub async fn delete_contact_list(&self, tenant_id: TenantId, id: ContactListId) -> Result<()> {
        if !self.store.contact_lists.delete(tenant_id, id).await? {
            return Err(Error::NotFound("Contact list not found".to_string()));
        }
        Ok(())
    }

    pub async fn list_members(&self, tenant_id: TenantId, id: ContactListId) -> Result<Vec<Contact>> {
        let list = self.get_contact_list(tenant_id, id).await?;
        let filter = ContactFilter {
            contact_list_id: Some(list.id),
            ..Default::default()
        };
        self.store.contacts.list(tenant_id, &filter).await
    }

    /// Replace the members of a list. Every id must be a contact of the tenant.
    pub async fn set_members(
        &self,
        tenant_id: TenantId,
        id: ContactListId,
        contact_ids: Vec<ContactId>,
    ) -> Result<ContactList> {
        self.get_contact_list(tenant_id, id).await?;

        let owned: HashSet<ContactId> = self
            .store
            .contacts
            .get_by_ids(tenant_id, &contact_ids)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let foreign: Vec<String> = contact_ids
            .iter()
            .filter(|cid| !owned.contains(cid))
            .map(|cid| cid.to_string())
            .collect();
        if !foreign.is_empty() {
            return Err(Error::Validation(format!(
                "Contacts not found: {}",
                foreign.join(", ")
            )));
        }

        debug!(list_id = %id, members = contact_ids.len(), "Replacing list members");
        if !self
            .store
            .contact_lists
            .set_members(tenant_id, id, &contact_ids)
            .await?
        {
            return Err(Error::NotFound("Contact list not found".to_string()));
        }
        self.get_contact_list(tenant_id, id).await
    }
}
