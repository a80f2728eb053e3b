use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use std::sync::Arc;
use tracing::info;

use crate::{
    error::{FlowError, Result},
    session::{Session, SessionState, UserId},
    storage::SessionStore,
};

type SessionRow = (String, String, Option<String>, DateTime<Utc>, DateTime<Utc>);

/// PostgreSQL-backed session store, one row per user identity.
pub struct PostgresSessionStore {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresSessionStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self {
            pool: Arc::new(pool),
        };
        store.migrate().await?;
        info!("connected to PostgreSQL session store");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS insurance_sessions (
                user_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                extracted_data TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                last_activity TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS insurance_sessions_last_activity_idx \
             ON insurance_sessions (last_activity)",
        )
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    fn session_from_row(row: SessionRow) -> Result<Session> {
        let (user_id, state, extracted_data, created_at, last_activity) = row;
        let state: SessionState = state.parse()?;
        Session::restore(
            UserId::new(user_id),
            state,
            extracted_data,
            created_at,
            last_activity,
        )
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn get_or_create(&self, user_id: &UserId) -> Result<Session> {
        let fresh = Session::new(user_id.clone());
        sqlx::query(
            r#"
            INSERT INTO insurance_sessions (user_id, state, extracted_data, created_at, last_activity)
            VALUES ($1, $2, NULL, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.as_str())
        .bind(fresh.state().as_str())
        .bind(fresh.created_at())
        .bind(fresh.last_activity())
        .execute(&*self.pool)
        .await?;

        self.get(user_id)
            .await?
            .ok_or_else(|| FlowError::Storage(format!("session {} vanished after insert", user_id)))
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT user_id, state, extracted_data, created_at, last_activity
            FROM insurance_sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        row.map(Self::session_from_row).transpose()
    }

    async fn save(&self, session: Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO insurance_sessions (user_id, state, extracted_data, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                state = EXCLUDED.state,
                extracted_data = EXCLUDED.extracted_data,
                last_activity = EXCLUDED.last_activity
            "#,
        )
        .bind(session.user_id().as_str())
        .bind(session.state().as_str())
        .bind(session.extracted_data())
        .bind(session.created_at())
        .bind(session.last_activity())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, user_id: &UserId) -> Result<()> {
        sqlx::query("DELETE FROM insurance_sessions WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM insurance_sessions WHERE last_activity < $1")
            .bind(cutoff)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn len(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM insurance_sessions")
            .fetch_one(&*self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}
