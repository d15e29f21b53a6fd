//! Contact repository

use crate::db::DatabasePool;
use crate::models::{Contact, ContactFilter, CreateContact};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use zapflow_common::types::{ContactId, TenantId};
use zapflow_common::{Error, Result};
use uuid::Uuid;

/// Contact repository trait
///
/// Listing methods return contacts in creation order, which is the order
/// they are handed to the gateway.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Insert contacts, returning them in input order
    async fn create_batch(&self, contacts: Vec<CreateContact>) -> Result<Vec<Contact>>;

    async fn list(&self, tenant_id: TenantId, filter: &ContactFilter) -> Result<Vec<Contact>>;

    /// Contacts of the tenant among `ids`; unknown or foreign ids are skipped
    async fn get_by_ids(&self, tenant_id: TenantId, ids: &[ContactId]) -> Result<Vec<Contact>>;

    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<i64>;

    /// Bump `last_campaign_sent` and `total_campaigns_sent` for delivered contacts
    async fn record_sent(&self, ids: &[ContactId], at: DateTime<Utc>) -> Result<u64>;

    async fn delete(&self, tenant_id: TenantId, id: ContactId) -> Result<bool>;
}

/// Database contact repository
pub struct DbContactRepository {
    pool: DatabasePool,
}

impl DbContactRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for DbContactRepository {
    async fn create_batch(&self, contacts: Vec<CreateContact>) -> Result<Vec<Contact>> {
        let mut created = Vec::with_capacity(contacts.len());

        // Use a transaction for batch insert
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        for input in contacts {
            // v7 ids keep creation order stable within one transaction
            let contact = sqlx::query_as::<_, Contact>(
                r#"
                INSERT INTO contacts (id, tenant_id, campaign_id, name, phone, email, custom_fields)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(input.tenant_id)
            .bind(input.campaign_id)
            .bind(&input.name)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(&input.custom_fields)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

            created.push(contact);
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(created)
    }

    async fn list(&self, tenant_id: TenantId, filter: &ContactFilter) -> Result<Vec<Contact>> {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR campaign_id = $2)
              AND ($3::uuid IS NULL OR id IN (
                    SELECT contact_id FROM contact_list_members WHERE contact_list_id = $3))
              AND ($4::timestamptz IS NULL OR last_campaign_sent IS NULL OR last_campaign_sent < $4)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tenant_id)
        .bind(filter.campaign_id)
        .bind(filter.contact_list_id)
        .bind(filter.not_contacted_since)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_by_ids(&self, tenant_id: TenantId, ids: &[ContactId]) -> Result<Vec<Contact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts
            WHERE tenant_id = $1 AND id = ANY($2)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tenant_id)
        .bind(ids.to_vec())
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.0)
    }

    async fn record_sent(&self, ids: &[ContactId], at: DateTime<Utc>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE contacts SET
                last_campaign_sent = $2,
                total_campaigns_sent = total_campaigns_sent + 1
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .bind(at)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, tenant_id: TenantId, id: ContactId) -> Result<bool> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        // Keep the cached member counts of the lists in step
        sqlx::query(
            r#"
            UPDATE contact_lists SET contact_count = contact_count - 1, updated_at = NOW()
            WHERE id IN (SELECT contact_list_id FROM contact_list_members WHERE contact_id = $1)
              AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            return Ok(false);
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(true)
    }
}
