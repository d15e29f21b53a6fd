//! Zapflow API - REST API server
//!
//! This crate provides the REST API for zapflow: campaigns, contact
//! import, contact lists, the messaging channel and quota usage.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;

pub use auth::AppState;
pub use routes::create_router;
