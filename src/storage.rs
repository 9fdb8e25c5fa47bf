//! SQLite session log.
//!
//! One row per analysis session: who asked, when, and a small summary of the
//! last snapshot. Fetched activity is never persisted, every request fetches
//! fresh data.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use serde::Serialize;

use crate::model::NormalizedActivities;

/// A stored analysis session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub session_id: i64,
    pub user_id: String,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds of the last recorded snapshot.
    pub last_accessed: i64,
    /// Platforms seen in the last snapshot.
    pub platforms: Vec<String>,
    pub total_activities: i64,
    pub days_active: i64,
}

impl Session {
    fn from_row(row: &SqliteRow) -> Self {
        let platforms: String = row.get("platforms");
        Self {
            session_id: row.get("session_id"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
            last_accessed: row.get("last_accessed"),
            platforms: platforms
                .split(',')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            total_activities: row.get("total_activities"),
            days_active: row.get("days_active"),
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    /// Connect and initialize the schema.
    ///
    /// * `database_url` - e.g. "sqlite:coding_coach.db?mode=rwc" or "sqlite::memory:"
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Every in-memory connection is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                platforms TEXT NOT NULL DEFAULT '',
                total_activities INTEGER NOT NULL DEFAULT 0,
                days_active INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions(user_id, last_accessed)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Start a new session and return its id.
    pub async fn create_session(&self, user_id: &str, now: i64) -> anyhow::Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (user_id, created_at, last_accessed)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_session(&self, session_id: i64) -> anyhow::Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, user_id, created_at, last_accessed,
                   platforms, total_activities, days_active
            FROM sessions
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Session::from_row))
    }

    /// Store the summary of a snapshot and bump `last_accessed`.
    ///
    /// Returns false when the session does not exist.
    pub async fn record_summary(
        &self,
        session_id: i64,
        summary: &NormalizedActivities,
        now: i64,
    ) -> anyhow::Result<bool> {
        let platforms = summary
            .platforms
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let days_active = summary
            .growth_metrics
            .as_ref()
            .map(|m| m.days_active)
            .unwrap_or(0);

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET last_accessed = ?, platforms = ?, total_activities = ?, days_active = ?
            WHERE session_id = ?
            "#,
        )
        .bind(now)
        .bind(platforms)
        .bind(summary.total_count as i64)
        .bind(i64::from(days_active))
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All sessions for a user, most recently used first.
    pub async fn sessions_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Session>> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, user_id, created_at, last_accessed,
                   platforms, total_activities, days_active
            FROM sessions
            WHERE user_id = ?
            ORDER BY last_accessed DESC, session_id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Session::from_row).collect())
    }
}
