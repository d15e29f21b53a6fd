//! Contact handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use zapflow_common::Error;
use zapflow_core::ImportSummary;
use zapflow_storage::models::{Contact, ContactFilter};

use crate::auth::{AppState, AuthContext};
use crate::error::ApiResult;

/// Query parameters for listing contacts
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListContactsQuery {
    pub campaign_id: Option<Uuid>,
    pub list_id: Option<Uuid>,
    /// Only contacts not sent to within this many days
    pub not_contacted_days: Option<i64>,
}

impl ListContactsQuery {
    fn filter(&self) -> ContactFilter {
        ContactFilter {
            campaign_id: self.campaign_id,
            contact_list_id: self.list_id,
            not_contacted_since: self
                .not_contacted_days
                .filter(|days| *days > 0)
                .map(|days| Utc::now() - Duration::days(days)),
        }
    }
}

/// Import contacts from a CSV file
///
/// POST /api/v1/contacts/upload (multipart: `file`, optional `campaign_id`)
pub async fn upload_contacts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ImportSummary>)> {
    let mut file: Option<Vec<u8>> = None;
    let mut campaign_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("Invalid upload: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Validation(format!("Invalid upload: {}", e)))?;
                file = Some(bytes.to_vec());
            }
            Some("campaign_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::Validation(format!("Invalid upload: {}", e)))?;
                if !text.trim().is_empty() {
                    campaign_id = Some(
                        text.trim()
                            .parse()
                            .map_err(|_| Error::Validation("Invalid campaign_id".to_string()))?,
                    );
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| Error::Validation("No file uploaded".to_string()))?;
    let summary = state
        .service
        .import_contacts(auth.tenant_id, &file, campaign_id)
        .await?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// List contacts
///
/// GET /api/v1/contacts?campaign_id=&list_id=&not_contacted_days=
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListContactsQuery>,
) -> ApiResult<Json<Vec<Contact>>> {
    let contacts = state
        .service
        .list_contacts(auth.tenant_id, &query.filter())
        .await?;
    Ok(Json(contacts))
}

/// Delete a contact
///
/// DELETE /api/v1/contacts/:contact_id
pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(contact_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.service.delete_contact(auth.tenant_id, contact_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
