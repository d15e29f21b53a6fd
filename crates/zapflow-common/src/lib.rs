//! zapflow Common - Shared types and utilities
//!
//! This crate provides configuration, the error taxonomy and the
//! identifier types shared across all zapflow components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
