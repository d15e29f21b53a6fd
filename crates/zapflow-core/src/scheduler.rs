//! Campaign Scheduler - Picks up due campaigns and dispatches them
//!
//! A polling loop: every tick lists `scheduled` campaigns whose time has
//! passed and dispatches each one in its own task. A campaign that
//! cannot be processed is marked `failed`; the others in the same tick
//! carry on.

use crate::campaign::{resolve_targets, CampaignDispatcher};
use crate::gateway::MessagingGateway;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zapflow_common::config::SchedulerConfig;
use zapflow_common::types::CampaignId;
use zapflow_common::{Error, Result};
use zapflow_storage::models::{Campaign, CampaignStatus, Contact};
use zapflow_storage::{CampaignRepository, Store};

const NO_CONTACTS: &str = "No contacts found for scheduled campaign";
const NOT_CONNECTED: &str = "WhatsApp not connected for scheduled campaign";
const PROCESSING_FAILED: &str = "Error processing scheduled campaign";

/// Result of one polling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Due campaigns found
    pub total: usize,
    /// Campaigns handed to the dispatcher
    pub processed: usize,
}

/// Running scheduler task
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop polling and wait for the current tick to finish
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Scheduler task error: {}", e);
        }
    }
}

/// Campaign Scheduler
pub struct CampaignScheduler {
    store: Store,
    gateway: Arc<dyn MessagingGateway>,
    dispatcher: Arc<CampaignDispatcher>,
    poll_interval: Duration,
    run_on_start: bool,
    max_concurrent: usize,
}

impl CampaignScheduler {
    /// Create a new scheduler
    pub fn new(
        store: Store,
        gateway: Arc<dyn MessagingGateway>,
        dispatcher: Arc<CampaignDispatcher>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            dispatcher,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            run_on_start: config.run_on_start,
            max_concurrent: config.max_concurrent_dispatches.max(1),
        }
    }

    /// Spawn the polling loop
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        SchedulerHandle { cancel, task }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            max_concurrent = self.max_concurrent,
            "Campaign scheduler started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        if !self.run_on_start {
            // The first tick of an interval completes immediately
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Campaign scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.process_due().await {
                        error!(error = %e, "Scheduled campaign pass failed");
                    }
                }
            }
        }
    }

    /// Dispatch every due campaign once
    pub async fn process_due(self: &Arc<Self>) -> Result<TickSummary> {
        let due = self.store.campaigns.list_due(Utc::now()).await?;
        if due.is_empty() {
            debug!("No scheduled campaigns due");
            return Ok(TickSummary::default());
        }

        info!(count = due.len(), "Processing due campaigns");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(due.len());

        for campaign in due {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("Scheduler semaphore closed: {}", e)))?;
            let scheduler = Arc::clone(self);

            handles.push(tokio::spawn(async move {
                let dispatched = scheduler.process_campaign(campaign).await;
                drop(permit);
                dispatched
            }));
        }

        let mut summary = TickSummary {
            total: handles.len(),
            processed: 0,
        };
        for handle in handles {
            match handle.await {
                Ok(true) => summary.processed += 1,
                Ok(false) => {}
                Err(e) => error!("Scheduled campaign task error: {}", e),
            }
        }

        info!(
            total = summary.total,
            processed = summary.processed,
            "Scheduled campaign pass finished"
        );
        Ok(summary)
    }

    /// Returns whether the campaign was dispatched
    async fn process_campaign(&self, campaign: Campaign) -> bool {
        let id = campaign.id;
        match self.try_dispatch(&campaign).await {
            Ok(dispatched) => dispatched,
            // Someone else moved it on
            Err(Error::InvalidState(msg)) => {
                debug!(campaign_id = %id, "Skipping scheduled campaign: {}", msg);
                false
            }
            Err(e) => {
                error!(campaign_id = %id, error = %e, "Scheduled campaign failed");
                self.fail(id, &format!("{}: {}", PROCESSING_FAILED, e)).await;
                false
            }
        }
    }

    async fn try_dispatch(&self, campaign: &Campaign) -> Result<bool> {
        let contacts = self.resolve_contacts(campaign).await?;
        if contacts.is_empty() {
            warn!(campaign_id = %campaign.id, "Scheduled campaign has no contacts");
            self.fail(campaign.id, NO_CONTACTS).await;
            return Ok(false);
        }

        if !self
            .gateway
            .connection_status(campaign.tenant_id)
            .await?
            .connected
        {
            warn!(
                campaign_id = %campaign.id,
                tenant_id = %campaign.tenant_id,
                "Messaging channel offline for scheduled campaign"
            );
            self.fail(campaign.id, NOT_CONNECTED).await;
            return Ok(false);
        }

        self.dispatcher.dispatch(campaign, &contacts).await?;
        Ok(true)
    }

    /// Ids picked at schedule time, else the campaign's list, else every
    /// contact of the tenant
    async fn resolve_contacts(&self, campaign: &Campaign) -> Result<Vec<Contact>> {
        resolve_targets(&self.store, campaign, &campaign.scheduled_contact_ids).await
    }

    async fn fail(&self, id: CampaignId, message: &str) {
        match self
            .store
            .campaigns
            .mark_failed(id, &[CampaignStatus::Scheduled], message)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(campaign_id = %id, "Campaign no longer scheduled"),
            Err(e) => error!(campaign_id = %id, error = %e, "Failed to mark campaign as failed"),
        }
    }
}
