//! Campaign repository
//!
//! Status changes are conditional updates (`WHERE status = ANY(...)`), so
//! two workers racing on the same campaign cannot both move it forward.

use crate::db::DatabasePool;
use crate::models::{Campaign, CampaignOutcome, CampaignStatus, CreateCampaign, UpdateCampaign};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use zapflow_common::types::{CampaignId, ContactId, TenantId};
use zapflow_common::{Error, Result};
use uuid::Uuid;

/// Campaign repository trait
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign>;

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>>;

    async fn get_by_tenant(&self, tenant_id: TenantId, id: CampaignId) -> Result<Option<Campaign>>;

    /// Newest first
    async fn list_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Campaign>>;

    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<i64>;

    /// Apply changes to a draft campaign. Returns `None` when the campaign
    /// does not exist or is no longer a draft.
    async fn update_draft(
        &self,
        tenant_id: TenantId,
        id: CampaignId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>>;

    /// Delete a campaign with its logs and the contacts imported for it
    async fn delete(&self, tenant_id: TenantId, id: CampaignId) -> Result<bool>;

    /// draft|scheduled -> scheduled, storing the contact snapshot
    async fn schedule(
        &self,
        id: CampaignId,
        scheduled_at: DateTime<Utc>,
        contact_ids: &[ContactId],
    ) -> Result<bool>;

    /// draft|scheduled -> sending. Returns false when another worker won.
    async fn begin_sending(&self, id: CampaignId, total_contacts: i32) -> Result<bool>;

    /// sending -> completed|failed with final counters
    async fn finish(&self, id: CampaignId, outcome: &CampaignOutcome) -> Result<bool>;

    /// Any of `from` -> failed with an error message
    async fn mark_failed(
        &self,
        id: CampaignId,
        from: &[CampaignStatus],
        error_message: &str,
    ) -> Result<bool>;

    /// Scheduled campaigns whose time has come, oldest first
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    /// Set the target count while the campaign is still draft or scheduled
    async fn set_total_contacts(&self, id: CampaignId, total: i32) -> Result<bool>;
}

/// Database campaign repository
pub struct DbCampaignRepository {
    pool: DatabasePool,
}

impl DbCampaignRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn status_strings(statuses: &[CampaignStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl CampaignRepository for DbCampaignRepository {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let id = Uuid::now_v7();

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, tenant_id, name, message, image_url,
                delay_min, delay_max, batch_size, batch_delay,
                contact_list_id, scheduled_at, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'draft')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(&input.message)
        .bind(&input.image_url)
        .bind(input.pacing.delay_min)
        .bind(input.pacing.delay_max)
        .bind(input.pacing.batch_size)
        .bind(input.pacing.batch_delay)
        .bind(input.contact_list_id)
        .bind(input.scheduled_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_by_tenant(&self, tenant_id: TenantId, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE tenant_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(tenant_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.0)
    }

    async fn update_draft(
        &self,
        tenant_id: TenantId,
        id: CampaignId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                name = COALESCE($3, name),
                message = COALESCE($4, message),
                image_url = COALESCE($5, image_url),
                delay_min = COALESCE($6, delay_min),
                delay_max = COALESCE($7, delay_max),
                batch_size = COALESCE($8, batch_size),
                batch_delay = COALESCE($9, batch_delay),
                contact_list_id = COALESCE($10, contact_list_id),
                scheduled_at = COALESCE($11, scheduled_at),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND status = 'draft'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.message)
        .bind(&input.image_url)
        .bind(input.delay_min)
        .bind(input.delay_max)
        .bind(input.batch_size)
        .bind(input.batch_delay)
        .bind(input.contact_list_id)
        .bind(input.scheduled_at)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn delete(&self, tenant_id: TenantId, id: CampaignId) -> Result<bool> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        // Logs reference contacts, so they go first
        sqlx::query(
            r#"
            DELETE FROM campaign_logs
            WHERE campaign_id = $1
              AND EXISTS (SELECT 1 FROM campaigns WHERE id = $1 AND tenant_id = $2)
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query("DELETE FROM contacts WHERE campaign_id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn schedule(
        &self,
        id: CampaignId,
        scheduled_at: DateTime<Utc>,
        contact_ids: &[ContactId],
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'scheduled',
                scheduled_at = $2,
                scheduled_contact_ids = $3,
                total_contacts = $4,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'scheduled')
            "#,
        )
        .bind(id)
        .bind(scheduled_at)
        .bind(contact_ids.to_vec())
        .bind(contact_ids.len() as i32)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn begin_sending(&self, id: CampaignId, total_contacts: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'sending',
                total_contacts = $2,
                sent_count = 0,
                failed_count = 0,
                error_message = NULL,
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(total_contacts)
        .bind(status_strings(&CampaignStatus::DISPATCHABLE))
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn finish(&self, id: CampaignId, outcome: &CampaignOutcome) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = $2,
                sent_count = $3,
                failed_count = $4,
                error_message = $5,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(outcome.status.to_string())
        .bind(outcome.sent_count)
        .bind(outcome.failed_count)
        .bind(&outcome.error_message)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(
        &self,
        id: CampaignId,
        from: &[CampaignStatus],
        error_message: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'failed',
                error_message = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(status_strings(from))
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE status = 'scheduled'
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= $1
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn set_total_contacts(&self, id: CampaignId, total: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET total_contacts = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(total)
        .bind(status_strings(&CampaignStatus::DISPATCHABLE))
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
