//! Messaging channel handlers (pass-through to the gateway)

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use zapflow_core::gateway::{ConnectionStatus, PairingCode};

use crate::auth::{AppState, AuthContext};
use crate::error::ApiResult;

/// Disconnect response
#[derive(Debug, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub success: bool,
}

/// Pairing QR code, absent once connected
///
/// GET /api/v1/whatsapp/qr
pub async fn pairing_code(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<PairingCode>> {
    Ok(Json(state.gateway.pairing_code(auth.tenant_id).await?))
}

/// GET /api/v1/whatsapp/status
pub async fn connection_status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ConnectionStatus>> {
    Ok(Json(state.gateway.connection_status(auth.tenant_id).await?))
}

/// POST /api/v1/whatsapp/disconnect
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DisconnectResponse>> {
    let success = state.gateway.disconnect(auth.tenant_id).await?;
    info!(tenant_id = %auth.tenant_id, success, "Messaging channel disconnect");
    Ok(Json(DisconnectResponse { success }))
}
