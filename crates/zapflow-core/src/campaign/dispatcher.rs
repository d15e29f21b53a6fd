//! Campaign Dispatcher - Sends one campaign to its resolved contacts
//!
//! Contacts are split into batches of `batch_size` and handed to the
//! gateway one batch at a time. The gateway applies the delays; the
//! dispatcher only awaits each aggregate result and records it.

use super::personalize::Personalizer;
use crate::gateway::{BulkSendRequest, BulkSendResult, GatewayContact, MessagingGateway, PacingHints};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use zapflow_common::types::{CampaignId, ContactId};
use zapflow_common::{Error, Result};
use zapflow_storage::models::{
    Campaign, CampaignLogStatus, CampaignOutcome, CampaignStatus, Contact, CreateCampaignLog,
    Pacing,
};
use zapflow_storage::{CampaignLogRepository, CampaignRepository, ContactRepository, Store};

/// Error shown when a send resolves to no contacts
pub const NO_CONTACTS_SELECTED: &str = "No contacts selected for this campaign";

/// Error attached to failed contacts when the gateway gave no reason
const UNDELIVERED: &str = "Message not delivered";

/// Result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub campaign_id: CampaignId,
    pub status: CampaignStatus,
    pub total: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    /// Gateway calls made
    pub batches: usize,
    pub error_message: Option<String>,
}

/// Campaign Dispatcher
pub struct CampaignDispatcher {
    store: Store,
    gateway: Arc<dyn MessagingGateway>,
    personalizer: Personalizer,
    batch_timeout: Duration,
}

impl CampaignDispatcher {
    /// Create a new dispatcher
    pub fn new(store: Store, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self {
            store,
            gateway,
            personalizer: Personalizer::new(),
            batch_timeout: Duration::from_secs(1800),
        }
    }

    /// Upper bound for a single gateway call
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Send `campaign` to `contacts`, in the given order.
    ///
    /// Nothing is written when `contacts` is empty or the campaign is not
    /// `draft`/`scheduled`. Once the campaign has been moved to `sending`,
    /// it always ends `completed` or `failed`.
    pub async fn dispatch(&self, campaign: &Campaign, contacts: &[Contact]) -> Result<DispatchSummary> {
        if contacts.is_empty() {
            return Err(Error::Validation(NO_CONTACTS_SELECTED.to_string()));
        }

        match campaign.status_enum() {
            Some(status) if CampaignStatus::DISPATCHABLE.contains(&status) => {}
            _ => {
                return Err(Error::InvalidState(format!(
                    "Campaign cannot be sent while {}",
                    campaign.status
                )))
            }
        }

        let pacing = campaign.pacing();
        pacing.validate().map_err(Error::Validation)?;

        let total = i32::try_from(contacts.len())
            .map_err(|_| Error::Validation("Too many contacts for one campaign".to_string()))?;

        // Marks the campaign as taken before any message leaves
        if !self.store.campaigns.begin_sending(campaign.id, total).await? {
            return Err(Error::InvalidState(
                "Campaign is already being sent".to_string(),
            ));
        }

        info!(
            campaign_id = %campaign.id,
            tenant_id = %campaign.tenant_id,
            contacts = contacts.len(),
            batch_size = pacing.batch_size,
            "Dispatching campaign"
        );

        match self.run_batches(campaign, pacing, contacts).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!(campaign_id = %campaign.id, error = %e, "Dispatch aborted");
                if let Err(mark_err) = self
                    .store
                    .campaigns
                    .mark_failed(campaign.id, &[CampaignStatus::Sending], &e.to_string())
                    .await
                {
                    error!(
                        campaign_id = %campaign.id,
                        error = %mark_err,
                        "Failed to mark aborted campaign as failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_batches(
        &self,
        campaign: &Campaign,
        pacing: Pacing,
        contacts: &[Contact],
    ) -> Result<DispatchSummary> {
        let hints = PacingHints::from(pacing);
        let mut delivered_total = 0usize;
        let mut calls = 0usize;
        let mut gateway_error: Option<String> = None;
        let mut first_error: Option<String> = None;

        for batch in contacts.chunks(pacing.batch_size as usize) {
            calls += 1;
            match self.send_batch(campaign, hints, batch).await {
                Ok(result) => {
                    let delivered = result.success_count.min(batch.len());
                    if delivered < batch.len() && first_error.is_none() {
                        first_error = result.errors.into_iter().next();
                    }
                    delivered_total += delivered;
                    debug!(
                        campaign_id = %campaign.id,
                        batch = calls,
                        delivered,
                        undelivered = batch.len() - delivered,
                        "Batch sent"
                    );
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(
                        campaign_id = %campaign.id,
                        batch = calls,
                        error = %message,
                        "Gateway call failed, failing remaining contacts"
                    );
                    gateway_error = Some(message);
                    // The rest is not attempted
                    break;
                }
            }
        }

        // Positional attribution over the whole run: the first
        // `delivered_total` contacts in call order count as sent
        let failure = first_error
            .clone()
            .or_else(|| gateway_error.clone())
            .unwrap_or_else(|| UNDELIVERED.to_string());
        let (delivered, undelivered) = contacts.split_at(delivered_total);
        let now = Utc::now();

        let mut logs = Vec::with_capacity(contacts.len());
        logs.extend(delivered.iter().map(|contact| CreateCampaignLog {
            campaign_id: campaign.id,
            contact_id: contact.id,
            status: CampaignLogStatus::Sent,
            error_message: None,
            sent_at: Some(now),
        }));
        logs.extend(undelivered.iter().map(|contact| CreateCampaignLog {
            campaign_id: campaign.id,
            contact_id: contact.id,
            status: CampaignLogStatus::Failed,
            error_message: Some(failure.clone()),
            sent_at: None,
        }));
        self.store.campaign_logs.create_batch(logs).await?;

        let delivered_ids: Vec<ContactId> = delivered.iter().map(|c| c.id).collect();
        self.store.contacts.record_sent(&delivered_ids, now).await?;

        let sent_count = delivered.len();
        let failed_count = undelivered.len();

        let status = if gateway_error.is_none() && sent_count > 0 {
            CampaignStatus::Completed
        } else {
            CampaignStatus::Failed
        };
        let error_message = match status {
            CampaignStatus::Completed => None,
            _ => Some(
                gateway_error
                    .or(first_error)
                    .unwrap_or_else(|| UNDELIVERED.to_string()),
            ),
        };

        let outcome = CampaignOutcome {
            status,
            sent_count: sent_count as i32,
            failed_count: failed_count as i32,
            error_message: error_message.clone(),
        };
        if !self.store.campaigns.finish(campaign.id, &outcome).await? {
            warn!(campaign_id = %campaign.id, "Campaign left sending state during dispatch");
        }

        info!(
            campaign_id = %campaign.id,
            status = %status,
            sent = sent_count,
            failed = failed_count,
            batches = calls,
            "Campaign dispatch finished"
        );

        Ok(DispatchSummary {
            campaign_id: campaign.id,
            status,
            total: contacts.len(),
            sent_count,
            failed_count,
            batches: calls,
            error_message,
        })
    }

    async fn send_batch(
        &self,
        campaign: &Campaign,
        pacing: PacingHints,
        batch: &[Contact],
    ) -> Result<BulkSendResult> {
        let request = BulkSendRequest {
            contacts: batch
                .iter()
                .map(|contact| GatewayContact {
                    name: contact.name.clone(),
                    phone: contact.phone.clone(),
                    message: self.personalizer.render(&campaign.message, contact),
                })
                .collect(),
            template: campaign.message.clone(),
            image_url: campaign.image_url.clone(),
            pacing,
        };

        tokio::time::timeout(
            self.batch_timeout,
            self.gateway.send_bulk(campaign.tenant_id, request),
        )
        .await
        .map_err(|_| {
            Error::Gateway(format!(
                "no answer within {} seconds",
                self.batch_timeout.as_secs()
            ))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedGateway, Step};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;
    use zapflow_storage::memory::MemoryStore;
    use zapflow_storage::models::{CreateCampaign, CreateContact};

    struct Fixture {
        memory: Arc<MemoryStore>,
        store: Store,
        gateway: Arc<ScriptedGateway>,
        dispatcher: CampaignDispatcher,
        tenant: Uuid,
    }

    fn fixture() -> Fixture {
        let memory = Arc::new(MemoryStore::new());
        let store = Store::memory(memory.clone());
        let gateway = Arc::new(ScriptedGateway::new());
        let dispatcher = CampaignDispatcher::new(store.clone(), gateway.clone());
        Fixture {
            memory,
            store,
            gateway,
            dispatcher,
            tenant: Uuid::now_v7(),
        }
    }

    impl Fixture {
        async fn campaign(&self, batch_size: i32) -> Campaign {
            self.store
                .campaigns
                .create(CreateCampaign {
                    tenant_id: self.tenant,
                    name: "Black Friday".to_string(),
                    message: "Oi [nome], confira!".to_string(),
                    image_url: None,
                    pacing: Pacing {
                        batch_size,
                        ..Pacing::default()
                    },
                    contact_list_id: None,
                    scheduled_at: None,
                })
                .await
                .unwrap()
        }

        async fn contacts(&self, n: usize) -> Vec<Contact> {
            let input = (0..n)
                .map(|i| CreateContact {
                    tenant_id: self.tenant,
                    campaign_id: None,
                    name: format!("Contact {}", i),
                    phone: format!("55119999{:05}", i),
                    email: None,
                    custom_fields: None,
                })
                .collect();
            self.store.contacts.create_batch(input).await.unwrap()
        }

        async fn reload(&self, id: CampaignId) -> Campaign {
            self.store.campaigns.get(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_immediate_send_with_trailing_failures() {
        let f = fixture();
        let campaign = f.campaign(10).await;
        let contacts = f.contacts(25).await;

        f.gateway.push(Step::Deliver { failures: 0, error: None });
        f.gateway.push(Step::Deliver { failures: 0, error: None });
        f.gateway.push(Step::Deliver {
            failures: 3,
            error: Some("Contact 22: number not on WhatsApp".to_string()),
        });

        let summary = f.dispatcher.dispatch(&campaign, &contacts).await.unwrap();

        assert_eq!(f.gateway.batch_sizes(), vec![10, 10, 5]);
        assert_eq!(summary.status, CampaignStatus::Completed);
        assert_eq!(summary.sent_count, 22);
        assert_eq!(summary.failed_count, 3);

        let stored = f.reload(campaign.id).await;
        assert_eq!(stored.status_enum(), Some(CampaignStatus::Completed));
        assert_eq!(stored.sent_count, 22);
        assert_eq!(stored.failed_count, 3);
        assert_eq!(stored.total_contacts, 25);

        let logs = f.store.campaign_logs.list_by_campaign(campaign.id).await.unwrap();
        assert_eq!(logs.len(), 25);
        for (log, contact) in logs.iter().zip(&contacts) {
            assert_eq!(log.contact_id, contact.id);
        }
        assert!(logs[..22]
            .iter()
            .all(|l| l.status_enum() == Some(CampaignLogStatus::Sent) && l.sent_at.is_some()));
        assert!(logs[22..].iter().all(|l| {
            l.status_enum() == Some(CampaignLogStatus::Failed)
                && l.error_message.as_deref() == Some("Contact 22: number not on WhatsApp")
        }));

        let after = f
            .store
            .contacts
            .list(f.tenant, &Default::default())
            .await
            .unwrap();
        assert!(after[..22].iter().all(|c| c.total_campaigns_sent == 1
            && c.last_campaign_sent.is_some()));
        assert!(after[22..].iter().all(|c| c.total_campaigns_sent == 0));
    }

    #[tokio::test]
    async fn test_attribution_counts_across_the_whole_run() {
        let f = fixture();
        let campaign = f.campaign(2).await;
        let contacts = f.contacts(5).await;

        // The only failure is reported by the first batch
        f.gateway.push(Step::Deliver {
            failures: 1,
            error: Some("Contact 1: invalid number".to_string()),
        });

        let summary = f.dispatcher.dispatch(&campaign, &contacts).await.unwrap();
        assert_eq!(f.gateway.batch_sizes(), vec![2, 2, 1]);
        assert_eq!(summary.sent_count, 4);
        assert_eq!(summary.failed_count, 1);

        let logs = f.store.campaign_logs.list_by_campaign(campaign.id).await.unwrap();
        let statuses: Vec<_> = logs.iter().map(|l| l.status.as_str()).collect();
        assert_eq!(statuses, vec!["sent", "sent", "sent", "sent", "failed"]);
        assert_eq!(logs[4].contact_id, contacts[4].id);
        assert_eq!(
            logs[4].error_message.as_deref(),
            Some("Contact 1: invalid number")
        );
    }

    #[tokio::test]
    async fn test_batch_partitioning() {
        for (n, batch_size, expected) in [
            (20, 10, vec![10, 10]),
            (7, 3, vec![3, 3, 1]),
            (1, 10, vec![1]),
        ] {
            let f = fixture();
            let campaign = f.campaign(batch_size).await;
            let contacts = f.contacts(n).await;

            f.dispatcher.dispatch(&campaign, &contacts).await.unwrap();
            assert_eq!(f.gateway.batch_sizes(), expected);
        }
    }

    #[tokio::test]
    async fn test_messages_are_personalized() {
        let f = fixture();
        let campaign = f.campaign(10).await;
        let mut contacts = f.contacts(2).await;
        contacts[1].name = "   ".to_string();

        f.dispatcher.dispatch(&campaign, &contacts).await.unwrap();

        let (tenant, request) = f.gateway.calls().remove(0);
        assert_eq!(tenant, f.tenant);
        assert_eq!(request.template, "Oi [nome], confira!");
        assert_eq!(request.contacts[0].message, "Oi Contact 0, confira!");
        assert_eq!(request.contacts[1].message, "Oi , confira!");
        assert_eq!(request.pacing.delay_min_ms, 6_000);
        assert_eq!(request.pacing.batch_delay_ms, 60_000);
    }

    #[tokio::test]
    async fn test_gateway_error_fails_remaining_batches() {
        let f = fixture();
        let campaign = f.campaign(10).await;
        let contacts = f.contacts(25).await;

        f.gateway.push(Step::Deliver { failures: 0, error: None });
        f.gateway.push(Step::Fail("session closed".to_string()));

        let summary = f.dispatcher.dispatch(&campaign, &contacts).await.unwrap();

        // Third batch is never attempted
        assert_eq!(f.gateway.batch_sizes(), vec![10, 10]);
        assert_eq!(summary.status, CampaignStatus::Failed);
        assert_eq!(summary.sent_count, 10);
        assert_eq!(summary.failed_count, 15);

        let stored = f.reload(campaign.id).await;
        assert_eq!(stored.status_enum(), Some(CampaignStatus::Failed));
        assert!(stored
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("session closed"));

        let logs = f.store.campaign_logs.list_by_campaign(campaign.id).await.unwrap();
        assert_eq!(logs.len(), 25);
        let sent = logs
            .iter()
            .filter(|l| l.status_enum() == Some(CampaignLogStatus::Sent))
            .count();
        assert_eq!(sent, 10);
    }

    #[tokio::test]
    async fn test_nothing_delivered_is_failed() {
        let f = fixture();
        let campaign = f.campaign(10).await;
        let contacts = f.contacts(4).await;

        f.gateway.push(Step::Deliver { failures: 4, error: None });

        let summary = f.dispatcher.dispatch(&campaign, &contacts).await.unwrap();
        assert_eq!(summary.status, CampaignStatus::Failed);
        assert_eq!(summary.error_message.as_deref(), Some(UNDELIVERED));
    }

    #[tokio::test]
    async fn test_hung_gateway_times_out() {
        let f = fixture();
        let dispatcher = CampaignDispatcher::new(f.store.clone(), f.gateway.clone())
            .with_batch_timeout(Duration::from_millis(50));
        let campaign = f.campaign(10).await;
        let contacts = f.contacts(3).await;

        f.gateway.push(Step::Hang(Duration::from_secs(5)));

        let summary = dispatcher.dispatch(&campaign, &contacts).await.unwrap();
        assert_eq!(summary.status, CampaignStatus::Failed);
        assert_eq!(summary.failed_count, 3);
    }

    #[tokio::test]
    async fn test_empty_contact_set_is_refused_without_changes() {
        let f = fixture();
        let campaign = f.campaign(10).await;

        let err = f.dispatcher.dispatch(&campaign, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), NO_CONTACTS_SELECTED);

        let stored = f.reload(campaign.id).await;
        assert_eq!(stored.status_enum(), Some(CampaignStatus::Draft));
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_campaign_is_never_dispatched_twice() {
        let f = fixture();
        let campaign = f.campaign(10).await;
        let contacts = f.contacts(5).await;

        f.dispatcher.dispatch(&campaign, &contacts).await.unwrap();

        // Same stale snapshot, still saying "draft"
        let err = f.dispatcher.dispatch(&campaign, &contacts).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        assert_eq!(f.gateway.calls().len(), 1);
        let logs = f.store.campaign_logs.list_by_campaign(campaign.id).await.unwrap();
        assert_eq!(logs.len(), 5);
    }

    #[tokio::test]
    async fn test_storage_failure_marks_campaign_failed() {
        let f = fixture();
        let campaign = f.campaign(10).await;
        let contacts = f.contacts(2).await;
        f.memory.break_campaign(campaign.id);

        let err = f.dispatcher.dispatch(&campaign, &contacts).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(f.gateway.calls().is_empty());
    }
}
