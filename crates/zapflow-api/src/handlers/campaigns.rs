//! Campaign handlers

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use zapflow_core::scheduler::TickSummary;
use zapflow_core::{NewCampaign, SendOutcome};
use zapflow_storage::models::{Campaign, CampaignLog, UpdateCampaign};

use crate::auth::{require_scheduler_token, AppState, AuthContext};
use crate::error::ApiResult;

/// Campaign list response
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignListResponse {
    pub data: Vec<CampaignResponse>,
    pub total: usize,
}

/// Campaign response
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignResponse {
    pub id: Uuid,
    pub name: String,
    pub message: String,
    pub image_url: Option<String>,
    pub delay_min: i32,
    pub delay_max: i32,
    pub batch_size: i32,
    pub batch_delay: i32,
    pub contact_list_id: Option<Uuid>,
    pub status: String,
    pub total_contacts: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub progress_percentage: f64,
    pub error_message: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        let progress = c.progress_percentage();
        Self {
            id: c.id,
            name: c.name,
            message: c.message,
            image_url: c.image_url,
            delay_min: c.delay_min,
            delay_max: c.delay_max,
            batch_size: c.batch_size,
            batch_delay: c.batch_delay,
            contact_list_id: c.contact_list_id,
            status: c.status,
            total_contacts: c.total_contacts,
            sent_count: c.sent_count,
            failed_count: c.failed_count,
            progress_percentage: progress,
            error_message: c.error_message,
            scheduled_at: c.scheduled_at,
            started_at: c.started_at,
            completed_at: c.completed_at,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Request body for sending a campaign
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SendCampaignRequest {
    /// Send only to these contacts
    #[serde(default)]
    pub contact_ids: Option<Vec<Uuid>>,
}

/// List campaigns, newest first
///
/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CampaignListResponse>> {
    let campaigns = state.service.list_campaigns(auth.tenant_id).await?;
    let data: Vec<CampaignResponse> = campaigns.into_iter().map(CampaignResponse::from).collect();

    Ok(Json(CampaignListResponse {
        total: data.len(),
        data,
    }))
}

/// Create a new campaign
///
/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<NewCampaign>,
) -> ApiResult<(StatusCode, Json<CampaignResponse>)> {
    let campaign = state.service.create_campaign(auth.tenant_id, input).await?;
    Ok((StatusCode::CREATED, Json(campaign.into())))
}

/// Get a campaign
///
/// GET /api/v1/campaigns/:campaign_id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignResponse>> {
    let campaign = state.service.get_campaign(auth.tenant_id, campaign_id).await?;
    Ok(Json(campaign.into()))
}

/// Update a draft campaign
///
/// PUT /api/v1/campaigns/:campaign_id
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
    Json(input): Json<UpdateCampaign>,
) -> ApiResult<Json<CampaignResponse>> {
    let campaign = state
        .service
        .update_campaign(auth.tenant_id, campaign_id, input)
        .await?;
    Ok(Json(campaign.into()))
}

/// Delete a campaign with its logs and imported contacts
///
/// DELETE /api/v1/campaigns/:campaign_id
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .service
        .delete_campaign(auth.tenant_id, campaign_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a campaign now, or schedule it when it has a future send time
///
/// POST /api/v1/campaigns/:campaign_id/send
pub async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
    body: Option<Json<SendCampaignRequest>>,
) -> ApiResult<Json<SendOutcome>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();

    info!(%campaign_id, tenant_id = %auth.tenant_id, "Send requested");
    let outcome = state
        .service
        .send_campaign(auth.tenant_id, campaign_id, request.contact_ids)
        .await?;
    Ok(Json(outcome))
}

/// Delivery records of a campaign
///
/// GET /api/v1/campaigns/:campaign_id/logs
pub async fn campaign_logs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CampaignLog>>> {
    let logs = state.service.campaign_logs(auth.tenant_id, campaign_id).await?;
    Ok(Json(logs))
}

/// Run one scheduler pass now
///
/// POST /api/v1/campaigns/process-scheduled
pub async fn process_scheduled(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<TickSummary>> {
    require_scheduler_token(&headers, &state.config)?;
    let summary = state.scheduler.process_due().await?;
    Ok(Json(summary))
}
