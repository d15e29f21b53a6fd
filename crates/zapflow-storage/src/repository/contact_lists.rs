//! Contact list repository

use crate::db::DatabasePool;
use crate::models::{ContactList, CreateContactList, UpdateContactList};
use async_trait::async_trait;
use zapflow_common::types::{ContactId, ContactListId, TenantId};
use zapflow_common::{Error, Result};
use uuid::Uuid;

/// Contact list repository trait
#[async_trait]
pub trait ContactListRepository: Send + Sync {
    async fn create(&self, input: CreateContactList) -> Result<ContactList>;

    async fn get(&self, tenant_id: TenantId, id: ContactListId) -> Result<Option<ContactList>>;

    async fn list_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<ContactList>>;

    async fn update(
        &self,
        tenant_id: TenantId,
        id: ContactListId,
        input: UpdateContactList,
    ) -> Result<Option<ContactList>>;

    async fn delete(&self, tenant_id: TenantId, id: ContactListId) -> Result<bool>;

    /// Replace the membership of a list. Callers check that every contact
    /// belongs to the list's tenant.
    async fn set_members(
        &self,
        tenant_id: TenantId,
        id: ContactListId,
        contact_ids: &[ContactId],
    ) -> Result<bool>;
}

/// Database contact list repository
pub struct DbContactListRepository {
    pool: DatabasePool,
}

impl DbContactListRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactListRepository for DbContactListRepository {
    async fn create(&self, input: CreateContactList) -> Result<ContactList> {
        sqlx::query_as::<_, ContactList>(
            r#"
            INSERT INTO contact_lists (id, tenant_id, name, description, color)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.color)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, tenant_id: TenantId, id: ContactListId) -> Result<Option<ContactList>> {
        sqlx::query_as::<_, ContactList>(
            "SELECT * FROM contact_lists WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<ContactList>> {
        sqlx::query_as::<_, ContactList>(
            "SELECT * FROM contact_lists WHERE tenant_id = $1 ORDER BY name ASC",
        )
        .bind(tenant_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        id: ContactListId,
        input: UpdateContactList,
    ) -> Result<Option<ContactList>> {
        sqlx::query_as::<_, ContactList>(
            r#"
            UPDATE contact_lists SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                color = COALESCE($5, color),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.color)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn delete(&self, tenant_id: TenantId, id: ContactListId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contact_lists WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_members(
        &self,
        tenant_id: TenantId,
        id: ContactListId,
        contact_ids: &[ContactId],
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let updated = sqlx::query(
            "UPDATE contact_lists SET contact_count = 0, updated_at = NOW() WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if updated.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM contact_list_members WHERE contact_list_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO contact_list_members (contact_list_id, contact_id)
            SELECT $1, c.id FROM contacts c
            WHERE c.id = ANY($2) AND c.tenant_id = $3
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(contact_ids.to_vec())
        .bind(tenant_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query("UPDATE contact_lists SET contact_count = $2 WHERE id = $1")
            .bind(id)
            .bind(inserted.rows_affected() as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(true)
    }
}
