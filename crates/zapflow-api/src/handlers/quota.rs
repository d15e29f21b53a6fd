//! Quota usage handler

use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use zapflow_core::QuotaUsage;

use crate::auth::{AppState, AuthContext};
use crate::error::ApiResult;

/// GET /api/v1/quota
pub async fn usage(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<QuotaUsage>> {
    Ok(Json(state.quota.usage(auth.tenant_id).await?))
}
