//! Contact list handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use zapflow_storage::models::{Contact, ContactList, UpdateContactList};

use crate::auth::{AppState, AuthContext};
use crate::error::ApiResult;

/// Request body for creating a contact list
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateContactListRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// Request body for replacing list members
#[derive(Debug, Serialize, Deserialize)]
pub struct SetMembersRequest {
    pub contact_ids: Vec<Uuid>,
}

/// GET /api/v1/contact-lists
pub async fn list_contact_lists(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ContactList>>> {
    Ok(Json(state.service.list_contact_lists(auth.tenant_id).await?))
}

/// POST /api/v1/contact-lists
pub async fn create_contact_list(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateContactListRequest>,
) -> ApiResult<(StatusCode, Json<ContactList>)> {
    let list = state
        .service
        .create_contact_list(auth.tenant_id, input.name, input.description, input.color)
        .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// GET /api/v1/contact-lists/:list_id
pub async fn get_contact_list(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<ContactList>> {
    Ok(Json(
        state.service.get_contact_list(auth.tenant_id, list_id).await?,
    ))
}

/// PUT /api/v1/contact-lists/:list_id
pub async fn update_contact_list(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(list_id): Path<Uuid>,
    Json(input): Json<UpdateContactList>,
) -> ApiResult<Json<ContactList>> {
    let list = state
        .service
        .update_contact_list(auth.tenant_id, list_id, input)
        .await?;
    Ok(Json(list))
}

/// DELETE /api/v1/contact-lists/:list_id
pub async fn delete_contact_list(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(list_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .service
        .delete_contact_list(auth.tenant_id, list_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/contact-lists/:list_id/contacts
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(list_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Contact>>> {
    Ok(Json(state.service.list_members(auth.tenant_id, list_id).await?))
}

/// PUT /api/v1/contact-lists/:list_id/contacts
pub async fn set_members(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(list_id): Path<Uuid>,
    Json(input): Json<SetMembersRequest>,
) -> ApiResult<Json<ContactList>> {
    let list = state
        .service
        .set_members(auth.tenant_id, list_id, input.contact_ids)
        .await?;
    Ok(Json(list))
}
