//! SessionStore — persistence boundary for interview sessions.
//!
//! The core only needs load-by-id, insert, compare-and-swap save, listing,
//! and delete. Saves are atomic over the full record (conversation
//! included), and the version CAS rejects a concurrent writer instead of
//! silently interleaving two conversations.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE mock_interviews (
//!     id               UUID PRIMARY KEY,
//!     owner_id         UUID NOT NULL,
//!     role             TEXT NOT NULL,
//!     experience_years INT NOT NULL,
//!     topics           TEXT NOT NULL,
//!     status           TEXT NOT NULL,
//!     conversation     JSONB NOT NULL,
//!     overall_feedback TEXT,
//!     overall_score    INT,
//!     version          BIGINT NOT NULL,
//!     created_at       TIMESTAMPTZ NOT NULL,
//!     updated_at       TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX mock_interviews_owner_idx ON mock_interviews (owner_id, created_at DESC);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::interview::models::{InterviewSession, SessionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict")]
    Conflict,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("corrupt session record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: Uuid, owner_id: Uuid)
        -> Result<Option<InterviewSession>, StoreError>;

    async fn insert(&self, session: &InterviewSession) -> Result<(), StoreError>;

    /// Persists the session only if the stored version still equals
    /// `expected_version`; the losing writer gets `StoreError::Conflict`.
    async fn save(
        &self,
        session: &InterviewSession,
        expected_version: i64,
    ) -> Result<(), StoreError>;

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<InterviewSession>, StoreError>;

    /// Returns `false` when no row matched the id/owner pair.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    owner_id: Uuid,
    role: String,
    experience_years: i32,
    topics: String,
    status: String,
    conversation: Value,
    overall_feedback: Option<String>,
    overall_score: Option<i32>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for InterviewSession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, StoreError> {
        let status = match row.status.as_str() {
            "active" => SessionStatus::Active,
            "completed" => SessionStatus::Completed,
            other => return Err(StoreError::Corrupt(format!("unknown status '{other}'"))),
        };
        let conversation = serde_json::from_value(row.conversation)
            .map_err(|e| StoreError::Corrupt(format!("conversation: {e}")))?;

        Ok(InterviewSession {
            id: row.id,
            owner_id: row.owner_id,
            role: row.role,
            experience_years: row.experience_years,
            topics: row.topics,
            status,
            conversation,
            overall_feedback: row.overall_feedback,
            overall_score: row.overall_score,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn conversation_json(session: &InterviewSession) -> Result<Value, StoreError> {
    serde_json::to_value(&session.conversation)
        .map_err(|e| StoreError::Corrupt(format!("conversation: {e}")))
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<InterviewSession>, StoreError> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM mock_interviews WHERE id = $1 AND owner_id = $2")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(InterviewSession::try_from).transpose()
    }

    async fn insert(&self, session: &InterviewSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO mock_interviews
                (id, owner_id, role, experience_years, topics, status, conversation,
                 overall_feedback, overall_score, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(session.id)
        .bind(session.owner_id)
        .bind(&session.role)
        .bind(session.experience_years)
        .bind(&session.topics)
        .bind(session.status.as_str())
        .bind(conversation_json(session)?)
        .bind(&session.overall_feedback)
        .bind(session.overall_score)
        .bind(session.version)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save(
        &self,
        session: &InterviewSession,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE mock_interviews
            SET status = $3, conversation = $4, overall_feedback = $5,
                overall_score = $6, version = $7, updated_at = $8
            WHERE id = $1 AND owner_id = $2 AND version = $9
            "#,
        )
        .bind(session.id)
        .bind(session.owner_id)
        .bind(session.status.as_str())
        .bind(conversation_json(session)?)
        .bind(&session.overall_feedback)
        .bind(session.overall_score)
        .bind(session.version)
        .bind(session.updated_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<InterviewSession>, StoreError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM mock_interviews WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InterviewSession::try_from).collect()
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM mock_interviews WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store for tests. Mirrors the CAS semantics of the Postgres
/// implementation.
#[cfg(test)]
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: std::sync::Mutex<std::collections::HashMap<Uuid, InterviewSession>>,
}

#[cfg(test)]
#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<InterviewSession>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&id)
            .filter(|s| s.owner_id == owner_id)
            .cloned())
    }

    async fn insert(&self, session: &InterviewSession) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn save(
        &self,
        session: &InterviewSession,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(&session.id) {
            Some(existing) if existing.version == expected_version => {
                sessions.insert(session.id, session.clone());
                Ok(())
            }
            _ => Err(StoreError::Conflict),
        }
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<InterviewSession>, StoreError> {
        let mut sessions: Vec<InterviewSession> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(&id) {
            Some(s) if s.owner_id == owner_id => {
                sessions.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
