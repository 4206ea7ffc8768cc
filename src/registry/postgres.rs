//! `PostgreSQL` backed session registry (`active_sessions` table, see `sql/schema.sql`).

use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row};
use tracing::{error, Instrument};

use super::{ActiveSession, RegistryError, SessionRegistry, SessionTerminator, SESSION_LIST_LIMIT};
use crate::context::PrincipalId;

#[derive(Debug, Clone)]
pub struct PgSessionRegistry {
    pool: PgPool,
}

impl PgSessionRegistry {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(what: &str, err: &sqlx::Error) -> RegistryError {
    error!("Failed to {what}: {err}");
    RegistryError::Unavailable(format!("failed to {what}"))
}

#[async_trait]
impl SessionRegistry for PgSessionRegistry {
    async fn count_active_sessions(&self, principal: &PrincipalId) -> Result<u64, RegistryError> {
        let query = r"
            SELECT COUNT(*)
            FROM active_sessions
            WHERE principal = $1
              AND expires_at > NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(principal.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("count active sessions", &err))?;

        let count: i64 = row.get(0);

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn active_sessions(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<ActiveSession>, RegistryError> {
        let query = r"
            SELECT session_id,
                   (EXTRACT(EPOCH FROM created_at) * 1000)::BIGINT AS created_at_ms,
                   user_agent,
                   remote_ip,
                   service_provider
            FROM active_sessions
            WHERE principal = $1
              AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(principal.as_str())
            .bind(i64::try_from(SESSION_LIST_LIMIT).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("list active sessions", &err))?;

        Ok(rows
            .into_iter()
            .map(|row| ActiveSession {
                session_id: row.get("session_id"),
                timestamp: row.get::<i64, _>("created_at_ms").to_string(),
                user_agent: row.get("user_agent"),
                ip_address: row.get("remote_ip"),
                service_provider: row.get("service_provider"),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .map_err(|err| unavailable("acquire database connection", &err))?;

        let ping_span =
            tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .map_err(|err| unavailable("ping database", &err))
    }
}

#[async_trait]
impl SessionTerminator for PgSessionRegistry {
    async fn terminate_session(&self, session_id: &str) -> Result<bool, RegistryError> {
        if session_id.trim().is_empty() {
            return Ok(false);
        }

        let query = "DELETE FROM active_sessions WHERE session_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| unavailable("terminate session", &err))?;

        Ok(result.rows_affected() > 0)
    }
}
