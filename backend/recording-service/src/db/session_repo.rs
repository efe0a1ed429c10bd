/// Session repository - Postgres-backed `SessionStore`
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::SessionStore;
use crate::error::{AppError, Result};
use crate::models::{PendingAcquisition, Session, SessionFilter, SessionRow, SessionUpdate};

const SESSION_COLUMNS: &str = r#"
    id, resource_id, sid, channel_name, recording_uid, mode, state,
    started_at, stopped_at, stored_file_keys, last_error
"#;

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_session(
        tx: &mut Transaction<'_, Postgres>,
        session: &Session,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recording_sessions (
                id, resource_id, sid, channel_name, recording_uid, mode, state,
                started_at, stopped_at, stored_file_keys, last_error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.id)
        .bind(&session.external_resource_id)
        .bind(&session.external_session_id)
        .bind(&session.channel_name)
        .bind(&session.recording_subject_id)
        .bind(session.mode.as_str())
        .bind(session.state.as_str())
        .bind(session.started_at)
        .bind(session.stopped_at)
        .bind(&session.stored_file_keys)
        .bind(&session.last_error)
        .execute(&mut **tx)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(detail) => AppError::Conflict(format!(
                "resource {} / sid {} already recorded: {}",
                session.external_resource_id, session.external_session_id, detail
            )),
            other => other,
        })?;
        Ok(())
    }
}

/// Escapes LIKE wildcards so the filter matches the literal substring.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: Session) -> Result<Session> {
        let mut tx = self.pool.begin().await?;
        Self::insert_session(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(session)
    }

    async fn read(&self, id: Uuid) -> Result<Session> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM recording_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::session_not_found(id))?
            .try_into()
    }

    async fn update(&self, id: Uuid, change: SessionUpdate) -> Result<Session> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent mutators of the same session
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM recording_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut session: Session = row.ok_or_else(|| AppError::session_not_found(id))?.try_into()?;
        change.apply(&mut session)?;

        sqlx::query(
            r#"
            UPDATE recording_sessions
            SET state = $2, stopped_at = $3, stored_file_keys = $4, last_error = $5
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.state.as_str())
        .bind(session.stopped_at)
        .bind(&session.stored_file_keys)
        .bind(&session.last_error)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(session_id = %id, state = session.state.as_str(), "session updated");
        Ok(session)
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let rows = match &filter.channel_contains {
            Some(needle) => {
                sqlx::query_as::<_, SessionRow>(&format!(
                    r#"
                    SELECT {SESSION_COLUMNS} FROM recording_sessions
                    WHERE channel_name ILIKE $1 ESCAPE '\'
                    ORDER BY started_at DESC, id DESC
                    LIMIT $2
                    "#
                ))
                .bind(like_pattern(needle))
                .bind(filter.limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SessionRow>(&format!(
                    r#"
                    SELECT {SESSION_COLUMNS} FROM recording_sessions
                    ORDER BY started_at DESC, id DESC
                    LIMIT $1
                    "#
                ))
                .bind(filter.limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Session::try_from).collect()
    }

    async fn record_pending(&self, pending: &PendingAcquisition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pending_acquisitions (id, channel_name, recording_uid, mode, resource_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(pending.id)
        .bind(&pending.channel_name)
        .bind(&pending.recording_uid)
        .bind(&pending.mode)
        .bind(&pending.resource_id)
        .bind(pending.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attach_pending_resource(&self, pending_id: Uuid, resource_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE pending_acquisitions SET resource_id = $2 WHERE id = $1")
            .bind(pending_id)
            .bind(resource_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "pending acquisition {pending_id}"
            )));
        }
        Ok(())
    }

    async fn promote_pending(&self, pending_id: Uuid, session: Session) -> Result<Session> {
        let mut tx = self.pool.begin().await?;
        Self::insert_session(&mut tx, &session).await?;
        sqlx::query("DELETE FROM pending_acquisitions WHERE id = $1")
            .bind(pending_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(session)
    }

    async fn discard_pending(&self, pending_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM pending_acquisitions WHERE id = $1")
            .bind(pending_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingAcquisition>> {
        let rows = sqlx::query_as::<_, PendingAcquisition>(
            r#"
            SELECT id, channel_name, recording_uid, mode, resource_id, created_at
            FROM pending_acquisitions
            WHERE created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("room"), "%room%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
