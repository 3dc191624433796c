//! Outgoing message entity - a queued channel message awaiting delivery

use chrono::{DateTime, Duration, Utc};

/// A message queued for delivery through the REST API
///
/// Rows are appended by application code and drained in id order by the
/// outgoing sender. A message that sits in the queue past `expires_at`
/// is dropped instead of sent, so stale announcements never go out after
/// an outage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub id: i64,
    pub channel_id: String,
    pub payload_json: String,
    pub expires_at: DateTime<Utc>,
}

impl OutgoingMessage {
    /// How long an enqueued message stays deliverable when the caller
    /// gives no explicit expiry
    pub const DEFAULT_TTL_SECS: i64 = 30;

    /// Create a new OutgoingMessage
    pub fn new(
        id: i64,
        channel_id: impl Into<String>,
        payload_json: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            channel_id: channel_id.into(),
            payload_json: payload_json.into(),
            expires_at,
        }
    }

    /// The expiry applied when the caller does not provide one
    pub fn default_expiry() -> DateTime<Utc> {
        Utc::now() + Duration::seconds(Self::DEFAULT_TTL_SECS)
    }

    /// Check whether the message is too old to send
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
