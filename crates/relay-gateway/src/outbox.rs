//! Durable outgoing message queue
//!
//! `Outbox` wraps the store with a wake-up signal so the sender drains
//! newly enqueued messages without waiting out the poll interval. The
//! sender delivers each drained message over REST; a delivery failure is
//! logged and the message dropped rather than retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relay_core::entities::OutgoingMessage;
use relay_core::traits::{OutgoingMessageStore, StoreResult};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::rest::RestClient;

/// How often the sender checks for pending messages regardless of signals
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Write side of the outgoing queue
pub struct Outbox {
    store: Arc<dyn OutgoingMessageStore>,
    ready: Notify,
}

impl Outbox {
    pub fn new(store: Arc<dyn OutgoingMessageStore>) -> Self {
        Self {
            store,
            ready: Notify::new(),
        }
    }

    /// Queue a message for delivery and wake the sender
    pub async fn enqueue(
        &self,
        channel_id: &str,
        payload_json: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<i64> {
        let id = self
            .store
            .enqueue(channel_id, payload_json, expires_at)
            .await?;
        debug!(id, channel_id = %channel_id, "Message enqueued");
        self.ready.notify_one();
        Ok(id)
    }

    async fn drain(&self) -> StoreResult<Vec<OutgoingMessage>> {
        self.store.take_pending().await
    }
}

/// Background task delivering queued messages over REST
pub struct OutgoingSender {
    outbox: Arc<Outbox>,
    rest: Arc<RestClient>,
}

impl OutgoingSender {
    pub fn new(outbox: Arc<Outbox>, rest: Arc<RestClient>) -> Self {
        Self { outbox, rest }
    }

    /// Drain the queue on a timer and on enqueue signals until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut poll = tokio::time::interval(POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Outgoing sender stopped");
                    return;
                }
                _ = poll.tick() => {}
                () = self.outbox.ready.notified() => {}
            }

            self.flush().await;
        }
    }

    /// Deliver one drained batch. The batch already left the store, so
    /// each message either goes out now or is dropped.
    async fn flush(&self) {
        let batch = match self.outbox.drain().await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Failed to drain outgoing queue");
                return;
            }
        };

        if batch.is_empty() {
            return;
        }

        info!(count = batch.len(), "Delivering outgoing messages");
        let now = Utc::now();

        for message in batch {
            if message.is_expired(now) {
                debug!(
                    id = message.id,
                    channel_id = %message.channel_id,
                    "Dropping expired message"
                );
                continue;
            }

            if let Err(e) = self
                .rest
                .create_message(&message.channel_id, &message.payload_json)
                .await
            {
                error!(
                    id = message.id,
                    channel_id = %message.channel_id,
                    error = %e,
                    "Failed to deliver message"
                );
            }
        }
    }
}
