// SQLite-backed delegation store.
//
// Tables:
// - moderators: global grants (mod_level = 1), at most one per channel
// - delegated_moderators: moderator <-> creator grants, duplicates tolerated
//
// Both read the channels table for display names, so the channel directory
// must be migrated first.

use crate::core::channels::Channel;
use crate::core::delegation::{DelegationStore, ModeratorGrant, GLOBAL_MOD_LEVEL};
use crate::core::errors::ModerationError;
use crate::infra::database::format_ts;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteDelegationStore {
    pool: Pool<Sqlite>,
}

impl SqliteDelegationStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS moderators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mod_channel_id TEXT NOT NULL,
                mod_level INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_moderators_one_global
                ON moderators(mod_channel_id) WHERE mod_level = 1;
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS delegated_moderators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mod_channel_id TEXT NOT NULL,
                creator_channel_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_delegated_moderators_mod
                ON delegated_moderators(mod_channel_id);
            CREATE INDEX IF NOT EXISTS idx_delegated_moderators_creator
                ON delegated_moderators(creator_channel_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl DelegationStore for SqliteDelegationStore {
    async fn delegated_grants(
        &self,
        moderator_claim_id: &str,
    ) -> Result<Vec<ModeratorGrant>, ModerationError> {
        // Inner join: grants whose creator channel is unknown are skipped
        let rows = sqlx::query(
            r#"
            SELECT d.mod_channel_id, c.claim_id, c.name
            FROM delegated_moderators d
            JOIN channels c ON c.claim_id = d.creator_channel_id
            WHERE d.mod_channel_id = ?
            ORDER BY d.id
            "#,
        )
        .bind(moderator_claim_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| ModeratorGrant::Delegated {
                moderator_claim_id: r.get("mod_channel_id"),
                creator_claim_id: r.get("claim_id"),
                creator_name: r.get("name"),
            })
            .collect())
    }

    async fn global_grant(
        &self,
        moderator_claim_id: &str,
    ) -> Result<Option<ModeratorGrant>, ModerationError> {
        let row = sqlx::query(
            "SELECT mod_channel_id FROM moderators WHERE mod_channel_id = ? AND mod_level = ?",
        )
        .bind(moderator_claim_id)
        .bind(GLOBAL_MOD_LEVEL)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(row.map(|r| ModeratorGrant::Global {
            moderator_claim_id: r.get("mod_channel_id"),
        }))
    }

    async fn add_delegate(
        &self,
        moderator: &Channel,
        creator: &Channel,
    ) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO delegated_moderators (mod_channel_id, creator_channel_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&moderator.claim_id)
        .bind(&creator.claim_id)
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn remove_delegate(
        &self,
        moderator_claim_id: &str,
        creator_claim_id: &str,
    ) -> Result<u64, ModerationError> {
        let result = sqlx::query(
            "DELETE FROM delegated_moderators WHERE mod_channel_id = ? AND creator_channel_id = ?",
        )
        .bind(moderator_claim_id)
        .bind(creator_claim_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn delegates_of(&self, creator_claim_id: &str) -> Result<Vec<Channel>, ModerationError> {
        let rows = sqlx::query(
            r#"
            SELECT c.claim_id, c.name, MIN(d.id) AS first_grant
            FROM delegated_moderators d
            JOIN channels c ON c.claim_id = d.mod_channel_id
            WHERE d.creator_channel_id = ?
            GROUP BY c.claim_id, c.name
            ORDER BY first_grant
            "#,
        )
        .bind(creator_claim_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| Channel::new(r.get::<String, _>("claim_id"), r.get::<String, _>("name")))
            .collect())
    }

    async fn grant_global(&self, moderator_claim_id: &str) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO moderators (mod_channel_id, mod_level, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(moderator_claim_id)
        .bind(GLOBAL_MOD_LEVEL)
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::ChannelDirectory;
    use crate::infra::channels::SqliteChannelDirectory;
    use crate::infra::database::tests::temp_pool;

    const MOD: &str = "1111111111111111111111111111111111111111";
    const CREATOR: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    async fn setup() -> (tempfile::TempDir, SqliteDelegationStore, SqliteChannelDirectory) {
        let (dir, pool) = temp_pool().await;
        let directory = SqliteChannelDirectory::new(pool.clone());
        directory.migrate().await.unwrap();
        let store = SqliteDelegationStore::new(pool);
        store.migrate().await.unwrap();
        (dir, store, directory)
    }

    #[tokio::test]
    async fn test_no_rows_is_not_an_error() {
        let (_dir, store, _) = setup().await;
        assert!(store.delegated_grants(MOD).await.unwrap().is_empty());
        assert!(store.global_grant(MOD).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delegation_round_trip() {
        let (_dir, store, directory) = setup().await;
        let moderator = directory.find_or_create(MOD, "@mod").await.unwrap();
        let creator = directory.find_or_create(CREATOR, "@creator").await.unwrap();

        store.add_delegate(&moderator, &creator).await.unwrap();
        store.add_delegate(&moderator, &creator).await.unwrap();

        // Duplicates come back from the moderator side...
        assert_eq!(store.delegated_grants(MOD).await.unwrap().len(), 2);
        // ...but a creator lists each delegate once
        assert_eq!(store.delegates_of(CREATOR).await.unwrap(), vec![moderator]);

        assert_eq!(store.remove_delegate(MOD, CREATOR).await.unwrap(), 2);
        assert!(store.delegated_grants(MOD).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_global_grant_is_unique() {
        let (_dir, store, _) = setup().await;
        store.grant_global(MOD).await.unwrap();
        store.grant_global(MOD).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM moderators")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(store.global_grant(MOD).await.unwrap().is_some());
    }
}
