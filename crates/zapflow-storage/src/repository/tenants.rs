//! Tenant repository

use crate::db::DatabasePool;
use crate::models::{CreateTenant, Tenant};
use async_trait::async_trait;
use zapflow_common::types::{SubscriptionStatus, TenantId};
use zapflow_common::{Error, Result};
use uuid::Uuid;

/// Tenant repository trait
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create(&self, input: CreateTenant) -> Result<Tenant>;
    async fn get(&self, id: TenantId) -> Result<Option<Tenant>>;
}

/// Database tenant repository
pub struct DbTenantRepository {
    pool: DatabasePool,
}

impl DbTenantRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for DbTenantRepository {
    async fn create(&self, input: CreateTenant) -> Result<Tenant> {
        let id = Uuid::now_v7();
        let status = input
            .subscription_status
            .unwrap_or(SubscriptionStatus::Trial);

        sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, email, subscription_status, trial_ends_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(status.to_string())
        .bind(input.trial_ends_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: TenantId) -> Result<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
