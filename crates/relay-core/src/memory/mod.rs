//! In-memory store implementations
//!
//! Back the store traits with process memory. Used by tests and by
//! embedders that can live without sessions surviving a restart.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::entities::{GatewaySession, OutgoingMessage};
use crate::traits::{OutgoingMessageStore, SessionStore, StoreResult};

/// In-memory [`SessionStore`]
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<GatewaySession>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self) -> StoreResult<Option<GatewaySession>> {
        Ok(self.session.lock().clone())
    }

    async fn put(&self, session: &GatewaySession) -> StoreResult<()> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    async fn update_sequence(&self, sequence_number: i64) -> StoreResult<()> {
        if let Some(session) = self.session.lock().as_mut() {
            session.sequence_number = sequence_number;
        }
        Ok(())
    }

    async fn delete(&self) -> StoreResult<()> {
        *self.session.lock() = None;
        Ok(())
    }
}

/// In-memory [`OutgoingMessageStore`]
#[derive(Debug)]
pub struct MemoryOutgoingStore {
    queue: Mutex<Vec<OutgoingMessage>>,
    next_id: AtomicI64,
}

impl MemoryOutgoingStore {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryOutgoingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutgoingMessageStore for MemoryOutgoingStore {
    async fn enqueue(
        &self,
        channel_id: &str,
        payload_json: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let expires_at = expires_at.unwrap_or_else(OutgoingMessage::default_expiry);
        self.queue
            .lock()
            .push(OutgoingMessage::new(id, channel_id, payload_json, expires_at));
        Ok(id)
    }

    async fn take_pending(&self) -> StoreResult<Vec<OutgoingMessage>> {
        Ok(std::mem::take(&mut *self.queue.lock()))
    }
}
