//! IdeaBox Common Library
//!
//! Shared code for the IdeaBox service including:
//! - Database models, schema and repository
//! - Idea lifecycle, listing, category registry and statistics services
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Attachment storage and notifications
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod forms;
pub mod metrics;
pub mod notify;
pub mod services;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
