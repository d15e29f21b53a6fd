//! Integration tests for the campaign endpoints.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use chrono::{Duration, Utc};
use common::{authed, contacts_csv, spawn_app, TestApp, SCHEDULER_TOKEN};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use zapflow_api::error::ErrorResponse;
use zapflow_common::types::SubscriptionStatus;
use zapflow_storage::CampaignRepository;

async fn upload(app: &TestApp, rows: usize) {
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(contacts_csv(rows))
            .file_name("contatos.csv")
            .mime_type("text/csv"),
    );
    authed(app.server.post("/api/v1/contacts/upload"))
        .multipart(form)
        .await
        .assert_status(StatusCode::CREATED);
}

async fn create(app: &TestApp, body: Value) -> Value {
    let response = authed(app.server.post("/api/v1/campaigns")).json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

#[tokio::test]
async fn health_needs_no_key() {
    let app = spawn_app(SubscriptionStatus::Active).await;
    app.server.get("/health").await.assert_status_ok();
    app.server.get("/health/ready").await.assert_status_ok();
}

#[tokio::test]
async fn requests_without_key_are_rejected() {
    let app = spawn_app(SubscriptionStatus::Active).await;

    let response = app.server.get("/api/v1/campaigns").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<ErrorResponse>().error, "UNAUTHORIZED");

    app.server
        .get("/api/v1/campaigns")
        .add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("zf_test_wrong_key"),
        )
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn trial_tenant_gets_one_campaign() {
    let app = spawn_app(SubscriptionStatus::Trial).await;

    create(&app, json!({ "name": "Primeira", "message": "Oi [nome]" })).await;

    let response = authed(app.server.post("/api/v1/campaigns"))
        .json(&json!({ "name": "Segunda", "message": "Oi [nome]" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let body = response.json::<ErrorResponse>();
    assert_eq!(body.error, "QUOTA_EXCEEDED");
    assert!(body.message.contains("Upgrade your plan"));
    assert_eq!(app.memory.campaign_count(), 1);
}

#[tokio::test]
async fn invalid_pacing_is_rejected() {
    let app = spawn_app(SubscriptionStatus::Active).await;

    let response = authed(app.server.post("/api/v1/campaigns"))
        .json(&json!({
            "name": "Rápida",
            "message": "Oi",
            "delay_min": 10,
            "delay_max": 5
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(app.memory.campaign_count(), 0);
}

#[tokio::test]
async fn immediate_send_reports_counts() {
    let app = spawn_app(SubscriptionStatus::Active).await;
    upload(&app, 7).await;
    let campaign = create(
        &app,
        json!({ "name": "Promo", "message": "Oi [nome]!", "batch_size": 3 }),
    )
    .await;
    let id = campaign["id"].as_str().unwrap();

    let response = authed(app.server.post(&format!("/api/v1/campaigns/{}/send", id))).await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    assert_eq!(body["outcome"], "dispatched");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["sent_count"], 7);
    assert_eq!(app.gateway.batch_sizes(), vec![3, 3, 1]);

    let logs = authed(app.server.get(&format!("/api/v1/campaigns/{}/logs", id)))
        .await
        .json::<Vec<Value>>();
    assert_eq!(logs.len(), 7);

    // Sent campaigns cannot be sent again
    authed(app.server.post(&format!("/api/v1/campaigns/{}/send", id)))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn send_while_disconnected_explains_why() {
    let app = spawn_app(SubscriptionStatus::Active).await;
    upload(&app, 2).await;
    let campaign = create(&app, json!({ "name": "Promo", "message": "Oi" })).await;
    app.gateway.set_connected(app.tenant_id, false);

    let response = authed(app.server.post(&format!(
        "/api/v1/campaigns/{}/send",
        campaign["id"].as_str().unwrap()
    )))
    .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<ErrorResponse>().message,
        zapflow_core::campaign::NOT_CONNECTED
    );
}

#[tokio::test]
async fn future_send_is_scheduled_then_processed() {
    let app = spawn_app(SubscriptionStatus::Active).await;
    upload(&app, 2).await;
    let campaign = create(
        &app,
        json!({
            "name": "Amanhã",
            "message": "Oi [nome]",
            "scheduled_at": Utc::now() + Duration::hours(1)
        }),
    )
    .await;
    let id: uuid::Uuid = campaign["id"].as_str().unwrap().parse().unwrap();

    let response = authed(app.server.post(&format!("/api/v1/campaigns/{}/send", id)))
        .json(&json!({}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["outcome"], "scheduled");
    assert!(app.gateway.calls().is_empty());

    // Move the send time into the past
    let stored = app.store.campaigns.get(id).await.unwrap().unwrap();
    assert!(app
        .store
        .campaigns
        .schedule(id, Utc::now() - Duration::minutes(1), &stored.scheduled_contact_ids)
        .await
        .unwrap());

    app.server
        .post("/api/v1/campaigns/process-scheduled")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .post("/api/v1/campaigns/process-scheduled")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {}", SCHEDULER_TOKEN)).unwrap(),
        )
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "total": 1, "processed": 1 })
    );

    let campaign = authed(app.server.get(&format!("/api/v1/campaigns/{}", id)))
        .await
        .json::<Value>();
    assert_eq!(campaign["status"], "completed");
    assert_eq!(campaign["sent_count"], 2);
}

#[tokio::test]
async fn campaigns_of_other_tenants_are_hidden() {
    let app = spawn_app(SubscriptionStatus::Active).await;
    let response = authed(app.server.get(&format!(
        "/api/v1/campaigns/{}",
        uuid::Uuid::now_v7()
    )))
    .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
