//! Error handling utilities for stores

use relay_core::error::GatewayError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to GatewayError
pub fn map_db_error(e: SqlxError) -> GatewayError {
    GatewayError::Store(e.to_string())
}
