//! zapflow Storage - Database access for tenants, campaigns and contacts
//!
//! Repositories are traits with a PostgreSQL implementation. The
//! `test-util` feature adds an in-memory implementation used by the
//! tests of the core and api crates.

pub mod db;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
pub use store::Store;
