// SQLite-backed muted word store.
//
// Tables:
// - muted_words: one row per channel, words kept as a JSON array

use crate::core::errors::ModerationError;
use crate::core::muted_words::MutedWordStore;
use crate::infra::database::format_ts;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteMutedWordStore {
    pool: Pool<Sqlite>,
}

impl SqliteMutedWordStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS muted_words (
                claim_id TEXT PRIMARY KEY,
                words TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }

    /// Read-modify-write of one channel's list inside a single transaction.
    async fn edit_words<F>(&self, claim_id: &str, edit: F) -> Result<Vec<String>, ModerationError>
    where
        F: FnOnce(&mut Vec<String>) + Send,
    {
        let now = format_ts(Utc::now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        // Writing before reading takes the write lock up front, so concurrent
        // edits queue behind each other instead of reading the same snapshot.
        sqlx::query(
            r#"
            INSERT INTO muted_words (claim_id, words, updated_at)
            VALUES (?, '[]', ?)
            ON CONFLICT(claim_id) DO NOTHING
            "#,
        )
        .bind(claim_id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        let json: String = sqlx::query_scalar("SELECT words FROM muted_words WHERE claim_id = ?")
            .bind(claim_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        let mut words: Vec<String> =
            serde_json::from_str(&json).map_err(|e| ModerationError::StorageError(e.to_string()))?;

        edit(&mut words);

        let json =
            serde_json::to_string(&words).map_err(|e| ModerationError::StorageError(e.to_string()))?;
        sqlx::query("UPDATE muted_words SET words = ?, updated_at = ? WHERE claim_id = ?")
            .bind(&json)
            .bind(&now)
            .bind(claim_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(words)
    }
}

#[async_trait]
impl MutedWordStore for SqliteMutedWordStore {
    async fn get_words(&self, claim_id: &str) -> Result<Option<Vec<String>>, ModerationError> {
        let row = sqlx::query("SELECT words FROM muted_words WHERE claim_id = ?")
            .bind(claim_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        match row {
            Some(row) => {
                let json: String = row.get("words");
                let words = serde_json::from_str(&json)
                    .map_err(|e| ModerationError::StorageError(e.to_string()))?;
                Ok(Some(words))
            }
            None => Ok(None),
        }
    }

    async fn append_words(
        &self,
        claim_id: &str,
        words: &[String],
    ) -> Result<Vec<String>, ModerationError> {
        self.edit_words(claim_id, |current| current.extend_from_slice(words))
            .await
    }

    async fn remove_words(
        &self,
        claim_id: &str,
        words: &[String],
    ) -> Result<Vec<String>, ModerationError> {
        self.edit_words(claim_id, |current| current.retain(|word| !words.contains(word)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::database::tests::temp_pool;
    use std::sync::Arc;

    const CREATOR: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[tokio::test]
    async fn test_words_persist_in_order() {
        let (_dir, pool) = temp_pool().await;
        let store = SqliteMutedWordStore::new(pool);
        store.migrate().await.unwrap();

        assert_eq!(store.get_words(CREATOR).await.unwrap(), None);

        let words = vec!["spam".to_string(), "a, b".to_string(), "spam".to_string()];
        assert_eq!(store.append_words(CREATOR, &words).await.unwrap(), words);
        assert_eq!(store.get_words(CREATOR).await.unwrap(), Some(words));

        let left = store
            .remove_words(CREATOR, &["spam".to_string()])
            .await
            .unwrap();
        assert_eq!(left, vec!["a, b".to_string()]);
        assert_eq!(store.get_words(CREATOR).await.unwrap(), Some(left));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_every_word() {
        let (_dir, pool) = temp_pool().await;
        let store = Arc::new(SqliteMutedWordStore::new(pool));
        store.migrate().await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.append_words(CREATOR, &[format!("word{}", i)]).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut words = store.get_words(CREATOR).await.unwrap().unwrap();
        words.sort();
        let mut expected: Vec<String> = (0..16).map(|i| format!("word{}", i)).collect();
        expected.sort();
        assert_eq!(words, expected);
    }
}
