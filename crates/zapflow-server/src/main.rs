//! zapflow - Bulk messaging campaign server

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zapflow_api::{create_router, AppState};
use zapflow_common::config::{Config, LoggingConfig};
use zapflow_core::{
    CampaignDispatcher, CampaignScheduler, CampaignService, HttpGateway, MessagingGateway,
    TrialQuotaGuard,
};
use zapflow_storage::{DatabasePool, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting zapflow...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    let store = Store::postgres(db_pool.clone());

    // Messaging gateway
    let gateway: Arc<dyn MessagingGateway> = Arc::new(HttpGateway::new(config.gateway.clone())?);
    info!(url = %config.gateway.url, "Messaging gateway configured");

    let dispatcher = Arc::new(
        CampaignDispatcher::new(store.clone(), gateway.clone())
            .with_batch_timeout(Duration::from_secs(config.gateway.bulk_timeout_secs)),
    );
    let quota = Arc::new(TrialQuotaGuard::new(store.clone(), config.quota.clone()));
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
        &config.scheduler,
    ));

    // Start scheduler if enabled
    let scheduler_handle = if config.scheduler.enabled {
        Some(scheduler.clone().start())
    } else {
        info!("In-process scheduler disabled");
        None
    };

    // Start API server
    let state = Arc::new(AppState {
        store,
        service,
        scheduler,
        gateway,
        quota,
        db_pool: Some(db_pool),
        config: config.api.clone(),
    });
    let app = create_router(state).layer(cors_layer(&config.api.cors_origins));

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown signal received");

    if let Some(handle) = scheduler_handle {
        handle.stop().await;
    }

    info!("zapflow shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
