//! Gateway session database model

use sqlx::FromRow;

/// Database model for the gateway_session table
///
/// The table never holds more than one row; its primary key is a
/// constant boolean so upserts always hit the same row.
#[derive(Debug, Clone, FromRow)]
pub struct SessionModel {
    pub session_id: String,
    pub sequence_number: i64,
}
