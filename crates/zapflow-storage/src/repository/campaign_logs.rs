//! Campaign log repository

use crate::db::DatabasePool;
use crate::models::{CampaignLog, CreateCampaignLog};
use async_trait::async_trait;
use zapflow_common::types::CampaignId;
use zapflow_common::{Error, Result};
use uuid::Uuid;

/// Campaign log repository trait
#[async_trait]
pub trait CampaignLogRepository: Send + Sync {
    /// Append log rows, returning how many were written
    async fn create_batch(&self, logs: Vec<CreateCampaignLog>) -> Result<u64>;

    /// Logs of a campaign in the order they were written
    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignLog>>;
}

/// Database campaign log repository
pub struct DbCampaignLogRepository {
    pool: DatabasePool,
}

impl DbCampaignLogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignLogRepository for DbCampaignLogRepository {
    async fn create_batch(&self, logs: Vec<CreateCampaignLog>) -> Result<u64> {
        if logs.is_empty() {
            return Ok(0);
        }

        let mut count = 0u64;
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        for log in logs {
            let result = sqlx::query(
                r#"
                INSERT INTO campaign_logs (id, campaign_id, contact_id, status, error_message, sent_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(log.campaign_id)
            .bind(log.contact_id)
            .bind(log.status.to_string())
            .bind(&log.error_message)
            .bind(log.sent_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

            count += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count)
    }

    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignLog>> {
        sqlx::query_as::<_, CampaignLog>(
            "SELECT * FROM campaign_logs WHERE campaign_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
