//! API routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{campaigns, contact_lists, contacts, health, quota, whatsapp};

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .with_state(state.clone());

    // Campaign routes
    let campaign_routes = Router::new()
        .route(
            "/",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route("/process-scheduled", post(campaigns::process_scheduled))
        .route(
            "/:campaign_id",
            get(campaigns::get_campaign)
                .put(campaigns::update_campaign)
                .delete(campaigns::delete_campaign),
        )
        .route("/:campaign_id/send", post(campaigns::send_campaign))
        .route("/:campaign_id/logs", get(campaigns::campaign_logs));

    // Contact routes
    let contact_routes = Router::new()
        .route("/", get(contacts::list_contacts))
        .route("/upload", post(contacts::upload_contacts))
        .route("/:contact_id", axum::routing::delete(contacts::delete_contact));

    // Contact list routes
    let contact_list_routes = Router::new()
        .route(
            "/",
            get(contact_lists::list_contact_lists).post(contact_lists::create_contact_list),
        )
        .route(
            "/:list_id",
            get(contact_lists::get_contact_list)
                .put(contact_lists::update_contact_list)
                .delete(contact_lists::delete_contact_list),
        )
        .route(
            "/:list_id/contacts",
            get(contact_lists::list_members).put(contact_lists::set_members),
        );

    // Messaging channel routes
    let whatsapp_routes = Router::new()
        .route("/qr", get(whatsapp::pairing_code))
        .route("/status", get(whatsapp::connection_status))
        .route("/disconnect", post(whatsapp::disconnect));

    // API v1 routes with authentication
    let api_v1 = Router::new()
        .nest("/campaigns", campaign_routes)
        .nest("/contacts", contact_routes)
        .nest("/contact-lists", contact_list_routes)
        .nest("/whatsapp", whatsapp_routes)
        .route("/quota", get(quota::usage))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
}
