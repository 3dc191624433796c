//! # relay-db
//!
//! Database layer implementing the store traits with PostgreSQL via SQLx.
//!
//! ## Overview
//!
//! This crate provides PostgreSQL implementations for the store traits
//! defined in `relay-core`. It handles:
//!
//! - Connection pool management
//! - Database models with SQLx `FromRow` derives
//! - Entity ↔ Model mappers
//! - Store implementations
//! - Embedded schema migrations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_common::config::DatabaseConfig;
//! use relay_db::pool::create_pool;
//! use relay_db::repositories::PgSessionStore;
//! use relay_core::traits::SessionStore;
//!
//! async fn example(config: &DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(config).await?;
//!     relay_db::run_migrations(&pool).await?;
//!     let sessions = PgSessionStore::new(pool);
//!
//!     // Use the store...
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, PgPool};
pub use repositories::{PgOutgoingMessageStore, PgSessionStore};

/// Schema migrations embedded at compile time
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply any pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
