//! PostgreSQL implementation of OutgoingMessageStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use relay_core::entities::OutgoingMessage;
use relay_core::traits::{OutgoingMessageStore, StoreResult};

use crate::models::OutgoingMessageModel;

use super::error::map_db_error;

/// PostgreSQL implementation of OutgoingMessageStore
#[derive(Clone)]
pub struct PgOutgoingMessageStore {
    pool: PgPool,
}

impl PgOutgoingMessageStore {
    /// Create a new PgOutgoingMessageStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutgoingMessageStore for PgOutgoingMessageStore {
    #[instrument(skip(self, payload_json))]
    async fn enqueue(
        &self,
        channel_id: &str,
        payload_json: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<i64> {
        let expires_at = expires_at.unwrap_or_else(OutgoingMessage::default_expiry);

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO outgoing_message (channel_id, payload_json, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(channel_id)
        .bind(payload_json)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(id)
    }

    #[instrument(skip(self))]
    async fn take_pending(&self) -> StoreResult<Vec<OutgoingMessage>> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let models = sqlx::query_as::<_, OutgoingMessageModel>(
            r#"
            SELECT id, channel_id, payload_json, expires_at
            FROM outgoing_message
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if models.is_empty() {
            tx.commit().await.map_err(map_db_error)?;
            return Ok(Vec::new());
        }

        // Delete only the rows fetched above; anything enqueued while this
        // transaction runs stays behind for the next drain.
        let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        sqlx::query("DELETE FROM outgoing_message WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(models.into_iter().map(OutgoingMessage::from).collect())
    }
}
