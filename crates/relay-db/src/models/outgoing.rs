//! Outgoing message database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the outgoing_message table
#[derive(Debug, Clone, FromRow)]
pub struct OutgoingMessageModel {
    pub id: i64,
    pub channel_id: String,
    pub payload_json: String,
    pub expires_at: DateTime<Utc>,
}
