// SQLite connection setup shared by every store.

use crate::core::errors::ModerationError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// Open (creating if needed) the database behind `database_url`.
pub async fn connect(database_url: &str) -> anyhow::Result<Pool<Sqlite>> {
    let conn_str = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite://{}", database_url)
    };

    let options = SqliteConnectOptions::from_str(&conn_str)?
        .create_if_missing(true)
        .foreign_keys(true)
        // Concurrent writers wait for the lock instead of failing outright
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Fixed-width RFC 3339 so timestamps compare correctly as text.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(value: &str) -> Result<DateTime<Utc>, ModerationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ModerationError::StorageError(format!("bad timestamp '{}': {}", value, e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// A fresh file-backed database; keep the `TempDir` alive for the test.
    pub async fn temp_pool() -> (TempDir, Pool<Sqlite>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("moderation.db");
        let pool = connect(path.to_str().unwrap()).await.unwrap();
        (dir, pool)
    }

    #[test]
    fn test_timestamps_sort_as_text() {
        let early = Utc::now();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(format_ts(early) < format_ts(late));
        assert_eq!(
            parse_ts(&format_ts(early)).unwrap().timestamp_micros(),
            early.timestamp_micros()
        );
    }

    #[test]
    fn test_corrupt_timestamp_is_a_storage_error() {
        assert!(matches!(
            parse_ts("yesterday-ish"),
            Err(ModerationError::StorageError(_))
        ));
    }
}
