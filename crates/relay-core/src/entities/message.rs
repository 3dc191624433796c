//! Chat resources as the REST API returns them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// A channel message
///
/// Returned by the create-message endpoint and carried in
/// MESSAGE_CREATE dispatch payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    pub content: String,
    pub author: User,
    pub timestamp: DateTime<Utc>,
}
