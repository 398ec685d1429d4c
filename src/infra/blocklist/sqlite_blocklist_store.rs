// SQLite-backed shared blocklist store.
//
// Tables:
// - shared_blocked_lists: one list per owner, unset settings stored as NULL
// - blocked_list_invites: invite records, at most one pending per (list, invitee)
// - blocked_entries: channel-level blocks, one row per (creator, blocked)
//
// Names are read from the channels table, so the channel directory must be
// migrated first.

use crate::core::blocklist::{
    BlockedEntry, BlocklistStore, Invite, InviteStatus, ListSettings, NewInvite,
    SharedBlockedList,
};
use crate::core::channels::Channel;
use crate::core::errors::ModerationError;
use crate::infra::database::{format_ts, parse_ts};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

const LIST_COLUMNS: &str = r#"
    l.id, l.owner_claim_id, COALESCE(c.name, '') AS owner_name,
    l.name, l.category, l.description, l.member_invite_enabled,
    l.strike_one, l.strike_two, l.strike_three, l.invite_expiration, l.curse_jar_amount
"#;

const INVITE_COLUMNS: &str = r#"
    i.id, i.list_id, i.message, i.status, i.created_at, i.updated_at,
    i.inviter_claim_id, COALESCE(inviter.name, '') AS inviter_name,
    i.invitee_claim_id, COALESCE(invitee.name, '') AS invitee_name
"#;

const INVITE_JOINS: &str = r#"
    FROM blocked_list_invites i
    LEFT JOIN channels inviter ON inviter.claim_id = i.inviter_claim_id
    LEFT JOIN channels invitee ON invitee.claim_id = i.invitee_claim_id
"#;

pub struct SqliteBlocklistStore {
    pool: Pool<Sqlite>,
}

impl SqliteBlocklistStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shared_blocked_lists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_claim_id TEXT NOT NULL UNIQUE,
                name TEXT,
                category TEXT,
                description TEXT,
                member_invite_enabled BOOLEAN,
                strike_one INTEGER,
                strike_two INTEGER,
                strike_three INTEGER,
                invite_expiration INTEGER,
                curse_jar_amount INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        // The partial index is what makes concurrent invites safe
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blocked_list_invites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                list_id INTEGER NOT NULL REFERENCES shared_blocked_lists(id),
                inviter_claim_id TEXT NOT NULL,
                invitee_claim_id TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_invites_one_pending
                ON blocked_list_invites(list_id, invitee_claim_id) WHERE status = 'pending';
            CREATE INDEX IF NOT EXISTS idx_invites_invitee
                ON blocked_list_invites(invitee_claim_id, status);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blocked_entries (
                creator_claim_id TEXT NOT NULL,
                blocked_claim_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (creator_claim_id, blocked_claim_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn fetch_list(
        &self,
        filter: &str,
        value: ListKey<'_>,
    ) -> Result<Option<SharedBlockedList>, ModerationError> {
        let sql = format!(
            "SELECT {} FROM shared_blocked_lists l LEFT JOIN channels c ON c.claim_id = l.owner_claim_id WHERE {}",
            LIST_COLUMNS, filter
        );
        let query = sqlx::query(&sql);
        let query = match value {
            ListKey::Id(id) => query.bind(id as i64),
            ListKey::Owner(owner) => query.bind(owner),
        };
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(row.as_ref().map(list_from_row))
    }

    async fn fetch_invites(
        &self,
        filter: &str,
        binds: &[&str],
    ) -> Result<Vec<Invite>, ModerationError> {
        let sql = format!("SELECT {} {} WHERE {} ORDER BY i.id", INVITE_COLUMNS, INVITE_JOINS, filter);
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        rows.iter().map(invite_from_row).collect()
    }
}

enum ListKey<'a> {
    Id(u64),
    Owner(&'a str),
}

fn opt_u64(row: &SqliteRow, column: &str) -> Option<u64> {
    row.get::<Option<i64>, _>(column).map(|v| v as u64)
}

fn opt_i64(value: Option<u64>) -> Option<i64> {
    value.map(|v| v as i64)
}

fn list_from_row(row: &SqliteRow) -> SharedBlockedList {
    SharedBlockedList {
        id: row.get::<i64, _>("id") as u64,
        owner: Channel::new(
            row.get::<String, _>("owner_claim_id"),
            row.get::<String, _>("owner_name"),
        ),
        settings: ListSettings {
            name: row.get("name"),
            category: row.get("category"),
            description: row.get("description"),
            member_invite_enabled: row.get("member_invite_enabled"),
            strike_one: opt_u64(row, "strike_one"),
            strike_two: opt_u64(row, "strike_two"),
            strike_three: opt_u64(row, "strike_three"),
            invite_expiration: opt_u64(row, "invite_expiration"),
            curse_jar_amount: opt_u64(row, "curse_jar_amount"),
        },
    }
}

fn invite_from_row(row: &SqliteRow) -> Result<Invite, ModerationError> {
    let status: String = row.get("status");
    let status = InviteStatus::parse(&status).ok_or_else(|| {
        ModerationError::StorageError(format!("unknown invite status '{}'", status))
    })?;

    Ok(Invite {
        id: row.get::<i64, _>("id") as u64,
        list_id: row.get::<i64, _>("list_id") as u64,
        inviter: Channel::new(
            row.get::<String, _>("inviter_claim_id"),
            row.get::<String, _>("inviter_name"),
        ),
        invitee: Channel::new(
            row.get::<String, _>("invitee_claim_id"),
            row.get::<String, _>("invitee_name"),
        ),
        message: row.get("message"),
        status,
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        updated_at: parse_ts(&row.get::<String, _>("updated_at"))?,
    })
}

/// `?, ?, ...` for an `IN` clause.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[async_trait]
impl BlocklistStore for SqliteBlocklistStore {
    async fn upsert_list(
        &self,
        owner: &Channel,
        patch: &ListSettings,
    ) -> Result<SharedBlockedList, ModerationError> {
        let now = format_ts(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO shared_blocked_lists (
                owner_claim_id, name, category, description, member_invite_enabled,
                strike_one, strike_two, strike_three, invite_expiration, curse_jar_amount,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_claim_id) DO UPDATE SET
                name = COALESCE(excluded.name, shared_blocked_lists.name),
                category = COALESCE(excluded.category, shared_blocked_lists.category),
                description = COALESCE(excluded.description, shared_blocked_lists.description),
                member_invite_enabled = COALESCE(excluded.member_invite_enabled, shared_blocked_lists.member_invite_enabled),
                strike_one = COALESCE(excluded.strike_one, shared_blocked_lists.strike_one),
                strike_two = COALESCE(excluded.strike_two, shared_blocked_lists.strike_two),
                strike_three = COALESCE(excluded.strike_three, shared_blocked_lists.strike_three),
                invite_expiration = COALESCE(excluded.invite_expiration, shared_blocked_lists.invite_expiration),
                curse_jar_amount = COALESCE(excluded.curse_jar_amount, shared_blocked_lists.curse_jar_amount),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&owner.claim_id)
        .bind(&patch.name)
        .bind(&patch.category)
        .bind(&patch.description)
        .bind(patch.member_invite_enabled)
        .bind(opt_i64(patch.strike_one))
        .bind(opt_i64(patch.strike_two))
        .bind(opt_i64(patch.strike_three))
        .bind(opt_i64(patch.invite_expiration))
        .bind(opt_i64(patch.curse_jar_amount))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        self.list_owned_by(&owner.claim_id).await?.ok_or_else(|| {
            ModerationError::StorageError("list vanished after upsert".to_string())
        })
    }

    async fn get_list(&self, list_id: u64) -> Result<Option<SharedBlockedList>, ModerationError> {
        self.fetch_list("l.id = ?", ListKey::Id(list_id)).await
    }

    async fn list_owned_by(
        &self,
        owner_claim_id: &str,
    ) -> Result<Option<SharedBlockedList>, ModerationError> {
        self.fetch_list("l.owner_claim_id = ?", ListKey::Owner(owner_claim_id))
            .await
    }

    async fn lists_joined_by(&self, member_claim_id: &str) -> Result<Vec<u64>, ModerationError> {
        let rows = sqlx::query(
            r#"
            SELECT i.list_id
            FROM blocked_list_invites i
            WHERE i.invitee_claim_id = ?
              AND i.status = 'accepted'
              AND i.id = (
                  SELECT MAX(j.id) FROM blocked_list_invites j
                  WHERE j.list_id = i.list_id AND j.invitee_claim_id = i.invitee_claim_id
              )
            ORDER BY i.list_id
            "#,
        )
        .bind(member_claim_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| r.get::<i64, _>("list_id") as u64)
            .collect())
    }

    async fn insert_pending_invite(
        &self,
        invite: &NewInvite,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Invite, ModerationError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        if let Some(cutoff) = stale_before {
            let purged = sqlx::query(
                r#"
                DELETE FROM blocked_list_invites
                WHERE list_id = ? AND invitee_claim_id = ? AND status = 'pending' AND created_at < ?
                "#,
            )
            .bind(invite.list_id as i64)
            .bind(&invite.invitee.claim_id)
            .bind(format_ts(cutoff))
            .execute(&mut *tx)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

            if purged.rows_affected() > 0 {
                tracing::debug!(
                    list_id = invite.list_id,
                    invitee = %invite.invitee.claim_id,
                    "Expired pending invite replaced"
                );
            }
        }

        let created_at = format_ts(invite.created_at);
        let inserted = sqlx::query(
            r#"
            INSERT INTO blocked_list_invites (
                list_id, inviter_claim_id, invitee_claim_id, message, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(invite.list_id as i64)
        .bind(&invite.inviter.claim_id)
        .bind(&invite.invitee.claim_id)
        .bind(&invite.message)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => ModerationError::Conflict(
                "a pending invite already exists".to_string(),
            ),
            other => ModerationError::StorageError(other.to_string()),
        })?;

        tx.commit()
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(Invite {
            id: inserted.last_insert_rowid() as u64,
            list_id: invite.list_id,
            inviter: invite.inviter.clone(),
            invitee: invite.invitee.clone(),
            message: invite.message.clone(),
            status: InviteStatus::Pending,
            created_at: invite.created_at,
            updated_at: invite.created_at,
        })
    }

    async fn latest_invite(
        &self,
        list_id: u64,
        invitee_claim_id: &str,
    ) -> Result<Option<Invite>, ModerationError> {
        let sql = format!(
            "SELECT {} {} WHERE i.list_id = ? AND i.invitee_claim_id = ? ORDER BY i.id DESC LIMIT 1",
            INVITE_COLUMNS, INVITE_JOINS
        );
        let row = sqlx::query(&sql)
            .bind(list_id as i64)
            .bind(invitee_claim_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        row.as_ref().map(invite_from_row).transpose()
    }

    async fn transition_invite(
        &self,
        list_id: u64,
        invitee_claim_id: &str,
        from: &[InviteStatus],
        to: InviteStatus,
        created_after: Option<DateTime<Utc>>,
    ) -> Result<u64, ModerationError> {
        if from.is_empty() {
            return Ok(0);
        }

        let mut sql = format!(
            "UPDATE blocked_list_invites SET status = ?, updated_at = ? \
             WHERE list_id = ? AND invitee_claim_id = ? AND status IN ({})",
            placeholders(from.len())
        );
        if created_after.is_some() {
            sql.push_str(" AND created_at >= ?");
        }

        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(format_ts(Utc::now()))
            .bind(list_id as i64)
            .bind(invitee_claim_id);
        for status in from {
            query = query.bind(status.as_str());
        }
        if let Some(cutoff) = created_after {
            query = query.bind(format_ts(cutoff));
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn pending_invites_for(
        &self,
        invitee_claim_id: &str,
    ) -> Result<Vec<Invite>, ModerationError> {
        self.fetch_invites(
            "i.invitee_claim_id = ? AND i.status = 'pending'",
            &[invitee_claim_id],
        )
        .await
    }

    async fn delete_pending_invites(
        &self,
        inviter_claim_id: &str,
        invitee_claim_id: &str,
    ) -> Result<u64, ModerationError> {
        let result = sqlx::query(
            r#"
            DELETE FROM blocked_list_invites
            WHERE inviter_claim_id = ? AND invitee_claim_id = ? AND status = 'pending'
            "#,
        )
        .bind(inviter_claim_id)
        .bind(invitee_claim_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn invites(
        &self,
        list_id: u64,
        status: Option<InviteStatus>,
    ) -> Result<Vec<Invite>, ModerationError> {
        let mut sql = format!("SELECT {} {} WHERE i.list_id = ?", INVITE_COLUMNS, INVITE_JOINS);
        if status.is_some() {
            sql.push_str(" AND i.status = ?");
        }
        sql.push_str(" ORDER BY i.id");

        let mut query = sqlx::query(&sql).bind(list_id as i64);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        rows.iter().map(invite_from_row).collect()
    }

    async fn add_block(&self, creator: &Channel, blocked: &Channel) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO blocked_entries (creator_claim_id, blocked_claim_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(creator_claim_id, blocked_claim_id) DO NOTHING
            "#,
        )
        .bind(&creator.claim_id)
        .bind(&blocked.claim_id)
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn remove_block(
        &self,
        creator_claim_id: &str,
        blocked_claim_id: &str,
    ) -> Result<u64, ModerationError> {
        let result = sqlx::query(
            "DELETE FROM blocked_entries WHERE creator_claim_id = ? AND blocked_claim_id = ?",
        )
        .bind(creator_claim_id)
        .bind(blocked_claim_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn blocked_by(
        &self,
        creator_claim_ids: &[String],
    ) -> Result<Vec<BlockedEntry>, ModerationError> {
        if creator_claim_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT b.creator_claim_id, COALESCE(cc.name, '') AS creator_name,
                   b.blocked_claim_id, COALESCE(bc.name, '') AS blocked_name,
                   b.created_at
            FROM blocked_entries b
            LEFT JOIN channels cc ON cc.claim_id = b.creator_claim_id
            LEFT JOIN channels bc ON bc.claim_id = b.blocked_claim_id
            WHERE b.creator_claim_id IN ({})
            ORDER BY b.created_at
            "#,
            placeholders(creator_claim_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in creator_claim_ids {
            query = query.bind(id);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        rows.iter()
            .map(|r| -> Result<BlockedEntry, ModerationError> {
                Ok(BlockedEntry {
                    creator: Channel::new(
                        r.get::<String, _>("creator_claim_id"),
                        r.get::<String, _>("creator_name"),
                    ),
                    blocked: Channel::new(
                        r.get::<String, _>("blocked_claim_id"),
                        r.get::<String, _>("blocked_name"),
                    ),
                    created_at: parse_ts(&r.get::<String, _>("created_at"))?,
                })
            })
            .collect()
    }
}
