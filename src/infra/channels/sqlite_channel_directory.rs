// SQLite-backed channel directory.
//
// Tables:
// - channels: claim id -> display name last signed by the channel

use crate::core::channels::{Channel, ChannelDirectory};
use crate::core::errors::ModerationError;
use crate::infra::database::format_ts;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteChannelDirectory {
    pool: Pool<Sqlite>,
}

impl SqliteChannelDirectory {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                claim_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ChannelDirectory for SqliteChannelDirectory {
    async fn find_or_create(&self, claim_id: &str, name: &str) -> Result<Channel, ModerationError> {
        let now = format_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO channels (claim_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(claim_id) DO UPDATE SET
                name = excluded.name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(claim_id)
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(Channel::new(claim_id, name))
    }

    async fn find_or_insert(&self, claim_id: &str, name: &str) -> Result<Channel, ModerationError> {
        let now = format_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO channels (claim_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(claim_id) DO NOTHING
            "#,
        )
        .bind(claim_id)
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        self.find(claim_id).await?.ok_or_else(|| {
            ModerationError::StorageError(format!("channel {} vanished after insert", claim_id))
        })
    }

    async fn find(&self, claim_id: &str) -> Result<Option<Channel>, ModerationError> {
        let row = sqlx::query("SELECT claim_id, name FROM channels WHERE claim_id = ?")
            .bind(claim_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(row.map(|r| Channel::new(r.get::<String, _>("claim_id"), r.get::<String, _>("name"))))
    }
}
