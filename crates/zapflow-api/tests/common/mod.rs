//! Shared helpers for API integration tests.

#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use std::sync::Arc;
use uuid::Uuid;
use zapflow_api::auth::issue_api_key;
use zapflow_api::{create_router, AppState};
use zapflow_common::config::{ApiConfig, QuotaConfig, SchedulerConfig};
use zapflow_common::types::SubscriptionStatus;
use zapflow_core::testing::ScriptedGateway;
use zapflow_core::{CampaignDispatcher, CampaignScheduler, CampaignService, TrialQuotaGuard};
use zapflow_storage::memory::MemoryStore;
use zapflow_storage::models::CreateTenant;
use zapflow_storage::{Store, TenantRepository};

pub const API_KEY: &str = "zf_test_0123456789abcdef";
pub const SCHEDULER_TOKEN: &str = "cron-secret";

pub struct TestApp {
    pub server: TestServer,
    pub memory: Arc<MemoryStore>,
    pub store: Store,
    pub gateway: Arc<ScriptedGateway>,
    pub tenant_id: Uuid,
}

/// Build the full router on the in-memory store, with one tenant and one
/// API key.
pub async fn spawn_app(subscription: SubscriptionStatus) -> TestApp {
    let memory = Arc::new(MemoryStore::new());
    let store = Store::memory(memory.clone());
    let gateway = Arc::new(ScriptedGateway::new());

    let tenant = store
        .tenants
        .create(CreateTenant {
            name: "Loja Teste".to_string(),
            email: "dono@example.com".to_string(),
            subscription_status: Some(subscription),
            trial_ends_at: None,
        })
        .await
        .unwrap();
    issue_api_key(&store, tenant.id, "tests", API_KEY)
        .await
        .unwrap();

    let dispatcher = Arc::new(CampaignDispatcher::new(store.clone(), gateway.clone()));
    let quota = Arc::new(TrialQuotaGuard::new(store.clone(), QuotaConfig::default()));
    let service = Arc::new(CampaignService::new(
        store.clone(),
        gateway.clone(),
        dispatcher.clone(),
        quota.clone(),
    ));
    let scheduler = Arc::new(CampaignScheduler::new(
        store.clone(),
        gateway.clone(),
        dispatcher,
        &SchedulerConfig::default(),
    ));

    let state = Arc::new(AppState {
        store: store.clone(),
        service,
        scheduler,
        gateway: gateway.clone(),
        quota,
        db_pool: None,
        config: ApiConfig {
            cors_origins: Vec::new(),
            scheduler_token: Some(SCHEDULER_TOKEN.to_string()),
        },
    });

    TestApp {
        server: TestServer::new(create_router(state)).unwrap(),
        memory,
        store,
        gateway,
        tenant_id: tenant.id,
    }
}

/// Attach the test API key
pub fn authed(request: TestRequest) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static(API_KEY),
    )
}

/// CSV with `rows` valid contacts
pub fn contacts_csv(rows: usize) -> Vec<u8> {
    let mut out = String::from("Nome;Telefone;Cidade\n");
    for i in 0..rows {
        out.push_str(&format!("Cliente {};(11) 98{:07};Recife\n", i, i));
    }
    out.into_bytes()
}
