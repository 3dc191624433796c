//! Store traits (ports) - define the persistence interface the client drives
//!
//! The client defines what it needs from durable storage; the database
//! layer provides the implementation. Both stores are deliberately small:
//! one singleton session row and one append-only message queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{GatewaySession, OutgoingMessage};
use crate::error::GatewayError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, GatewayError>;

/// Durable storage for the gateway session
///
/// The sequence number must hit storage before the frame that carried it
/// is processed, so a crash never re-reads events the server thinks were
/// delivered.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the stored session, if any
    async fn get(&self) -> StoreResult<Option<GatewaySession>>;

    /// Replace the stored session
    async fn put(&self, session: &GatewaySession) -> StoreResult<()>;

    /// Record the latest seen sequence number
    ///
    /// A no-op when no session is stored yet.
    async fn update_sequence(&self, sequence_number: i64) -> StoreResult<()>;

    /// Forget the stored session
    async fn delete(&self) -> StoreResult<()>;
}

/// Durable queue of channel messages awaiting delivery
#[async_trait]
pub trait OutgoingMessageStore: Send + Sync {
    /// Append a message to the queue, returning its id
    ///
    /// Falls back to [`OutgoingMessage::default_expiry`] when
    /// `expires_at` is `None`.
    async fn enqueue(
        &self,
        channel_id: &str,
        payload_json: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<i64>;

    /// Remove and return every queued message, oldest first
    ///
    /// Fetch and delete must happen in one transaction so a batch is
    /// neither lost nor handed out twice.
    async fn take_pending(&self) -> StoreResult<Vec<OutgoingMessage>>;
}
