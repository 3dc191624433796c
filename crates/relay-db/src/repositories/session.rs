//! PostgreSQL implementation of SessionStore

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use relay_core::entities::GatewaySession;
use relay_core::traits::{SessionStore, StoreResult};

use crate::models::SessionModel;

use super::error::map_db_error;

/// PostgreSQL implementation of SessionStore
///
/// The gateway_session table holds at most one row; `put` upserts against
/// the fixed primary key so a new session always replaces the old one.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new PgSessionStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip(self))]
    async fn get(&self) -> StoreResult<Option<GatewaySession>> {
        let result = sqlx::query_as::<_, SessionModel>(
            r#"
            SELECT session_id, sequence_number
            FROM gateway_session
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(GatewaySession::from))
    }

    #[instrument(skip(self))]
    async fn put(&self, session: &GatewaySession) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gateway_session (session_id, sequence_number)
            VALUES ($1, $2)
            ON CONFLICT (pk) DO UPDATE
            SET session_id = EXCLUDED.session_id,
                sequence_number = EXCLUDED.sequence_number
            "#,
        )
        .bind(&session.session_id)
        .bind(session.sequence_number)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_sequence(&self, sequence_number: i64) -> StoreResult<()> {
        // No WHERE clause: the table has at most one row, and updating
        // zero rows (no active session) is not an error.
        sqlx::query("UPDATE gateway_session SET sequence_number = $1")
            .bind(sequence_number)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self) -> StoreResult<()> {
        sqlx::query("DELETE FROM gateway_session")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }
}
