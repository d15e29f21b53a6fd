//! Authentication module

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, warn};
use zapflow_common::config::ApiConfig;
use zapflow_common::types::{ApiKeyId, TenantId};
use zapflow_common::Error;
use zapflow_core::{CampaignScheduler, CampaignService, MessagingGateway, TrialQuotaGuard};
use zapflow_storage::{ApiKey, ApiKeyRepository, DatabasePool, Store};

use crate::error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub service: Arc<CampaignService>,
    pub scheduler: Arc<CampaignScheduler>,
    pub gateway: Arc<dyn MessagingGateway>,
    pub quota: Arc<TrialQuotaGuard>,
    /// Absent when running on the in-memory store
    pub db_pool: Option<DatabasePool>,
    pub config: ApiConfig,
}

/// Authenticated context extracted from API key
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The tenant ID this API key belongs to
    pub tenant_id: TenantId,
    /// API key ID for audit logging
    pub api_key_id: ApiKeyId,
}

/// Extract API key from request
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }

    headers.get("x-api-key").and_then(|key| key.to_str().ok())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|auth| auth.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
}

/// Extract the prefix from an API key (first 8 characters)
fn extract_key_prefix(api_key: &str) -> Option<&str> {
    api_key.get(..8)
}

/// Hash an API key for storage and comparison
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Store a new API key for `tenant_id`; returns the key record.
/// Only the hash and the 8-character prefix of `secret` are kept.
pub async fn issue_api_key(
    store: &Store,
    tenant_id: TenantId,
    name: &str,
    secret: &str,
) -> Result<ApiKey, Error> {
    let prefix = extract_key_prefix(secret)
        .ok_or_else(|| Error::Validation("API key must have at least 8 characters".to_string()))?;
    store
        .api_keys
        .create(tenant_id, name, &hash_api_key(secret), prefix)
        .await
}

/// Validate an API key against the key store
async fn validate_api_key(store: &Store, api_key: &str) -> Result<ApiKey, Error> {
    let prefix = extract_key_prefix(api_key).ok_or_else(|| {
        warn!("API key too short");
        Error::Auth("Invalid API key".to_string())
    })?;

    let candidates = store.api_keys.find_by_prefix(prefix).await?;
    if candidates.is_empty() {
        warn!("No API key found with prefix: {}", prefix);
        return Err(Error::Auth("Invalid API key".to_string()));
    }

    let hash = hash_api_key(api_key);
    for candidate in candidates {
        if candidate.key_hash == hash {
            if candidate.is_expired() {
                warn!("API key {} has expired", candidate.id);
                return Err(Error::Auth("API key has expired".to_string()));
            }

            // Fire and forget, auth does not fail on this
            let api_keys = store.api_keys.clone();
            let key_id = candidate.id;
            tokio::spawn(async move {
                if let Err(e) = api_keys.update_last_used(key_id).await {
                    error!("Failed to update API key last_used_at: {}", e);
                }
            });

            debug!(
                "API key {} authenticated for tenant {}",
                candidate.id, candidate.tenant_id
            );
            return Ok(candidate);
        }
    }

    warn!("API key hash mismatch for prefix: {}", prefix);
    Err(Error::Auth("Invalid API key".to_string()))
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // The scheduled-processing endpoint checks its own token
    if request.uri().path().ends_with("/campaigns/process-scheduled") {
        return Ok(next.run(request).await);
    }

    let api_key = extract_api_key(request.headers()).ok_or_else(|| {
        warn!("Missing API key in request to {}", request.uri().path());
        Error::Auth("Missing API key".to_string())
    })?;

    let validated_key = validate_api_key(&state.store, api_key).await?;

    request.extensions_mut().insert(AuthContext {
        tenant_id: validated_key.tenant_id,
        api_key_id: validated_key.id,
    });

    Ok(next.run(request).await)
}

/// Check the bearer token of an internal call against the configured
/// scheduler token. Rejects everything when no token is configured.
pub fn require_scheduler_token(headers: &HeaderMap, config: &ApiConfig) -> Result<(), Error> {
    let expected = config.scheduler_token.as_deref().filter(|t| !t.is_empty());
    match (expected, bearer_token(headers)) {
        (Some(expected), Some(given)) if given == expected => Ok(()),
        (None, _) => {
            warn!("Scheduled processing requested but no scheduler token is configured");
            Err(Error::Auth("Scheduled processing is disabled".to_string()))
        }
        _ => Err(Error::Auth("Invalid scheduler token".to_string())),
    }
}
