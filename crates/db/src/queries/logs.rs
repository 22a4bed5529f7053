// crates/db/src/queries/logs.rs
//! Log entries and their tags.
//!
//! Tags live in their own table and are linked through `log_tags`, which
//! keeps the order the user typed them in (`position`).

use std::collections::HashMap;

use worklog_core::{LogEntry, NewLogEntry};

use super::row_types::{LogRow, LogTagRow};
use crate::{Database, DbResult};

/// Hard cap on a single page of `list_logs`.
pub const LOG_PAGE_MAX: u32 = 200;

const LOG_COLUMNS: &str =
    "id, user_id, date, start_time, duration, content, impression, created_at, calendar_link";

impl Database {
    /// Store a validated entry with its tags in one transaction.
    pub async fn insert_log(&self, user_id: i64, entry: &NewLogEntry) -> DbResult<LogEntry> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "INSERT INTO logs (user_id, date, start_time, duration, content, impression) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(user_id)
        .bind(entry.date.format("%Y-%m-%d").to_string())
        .bind(entry.start_time.format("%H:%M").to_string())
        .bind(i64::from(entry.duration))
        .bind(&entry.content)
        .bind(entry.impression.as_deref())
        .execute(&mut *tx)
        .await?;
        let log_id = result.last_insert_rowid();

        for (position, name) in entry.tags.iter().enumerate() {
            sqlx::query("INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")
                .bind(name)
                .execute(&mut *tx)
                .await?;
            let (tag_id,): (i64,) = sqlx::query_as("SELECT id FROM tags WHERE name = ?1")
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO log_tags (log_id, tag_id, position) VALUES (?1, ?2, ?3)",
            )
            .bind(log_id)
            .bind(tag_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        let row: LogRow = sqlx::query_as(&format!("SELECT {LOG_COLUMNS} FROM logs WHERE id = ?1"))
            .bind(log_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        row.into_log_entry(entry.tags.clone())
    }

    /// One page of a user's entries, newest first.
    pub async fn list_logs(&self, user_id: i64, limit: u32, offset: u32) -> DbResult<Vec<LogEntry>> {
        let limit = limit.min(LOG_PAGE_MAX);
        let rows: Vec<LogRow> = sqlx::query_as(&format!(
            "SELECT {LOG_COLUMNS} FROM logs WHERE user_id = ?1 \
             ORDER BY date DESC, start_time DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(self.pool())
        .await?;

        let tags: Vec<LogTagRow> = sqlx::query_as(
            "SELECT lt.log_id, t.name FROM log_tags lt \
             JOIN tags t ON t.id = lt.tag_id \
             WHERE lt.log_id IN ( \
                 SELECT id FROM logs WHERE user_id = ?1 \
                 ORDER BY date DESC, start_time DESC, id DESC LIMIT ?2 OFFSET ?3) \
             ORDER BY lt.log_id, lt.position",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(self.pool())
        .await?;

        attach_tags(rows, tags)
    }

    /// Every entry a user owns, oldest first. Input for the aggregator.
    pub async fn all_logs(&self, user_id: i64) -> DbResult<Vec<LogEntry>> {
        let rows: Vec<LogRow> = sqlx::query_as(&format!(
            "SELECT {LOG_COLUMNS} FROM logs WHERE user_id = ?1 \
             ORDER BY date ASC, start_time ASC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        let tags: Vec<LogTagRow> = sqlx::query_as(
            "SELECT lt.log_id, t.name FROM log_tags lt \
             JOIN tags t ON t.id = lt.tag_id \
             JOIN logs l ON l.id = lt.log_id \
             WHERE l.user_id = ?1 \
             ORDER BY lt.log_id, lt.position",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        attach_tags(rows, tags)
    }

    /// `None` when the entry does not exist or belongs to someone else.
    pub async fn get_log(&self, user_id: i64, log_id: i64) -> DbResult<Option<LogEntry>> {
        let row: Option<LogRow> = sqlx::query_as(&format!(
            "SELECT {LOG_COLUMNS} FROM logs WHERE id = ?1 AND user_id = ?2"
        ))
        .bind(log_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags: Vec<(String,)> = sqlx::query_as(
            "SELECT t.name FROM log_tags lt JOIN tags t ON t.id = lt.tag_id \
             WHERE lt.log_id = ?1 ORDER BY lt.position",
        )
        .bind(log_id)
        .fetch_all(self.pool())
        .await?;

        row.into_log_entry(tags.into_iter().map(|(name,)| name).collect())
            .map(Some)
    }

    /// Returns whether a row was removed. Tag links go with it.
    pub async fn delete_log(&self, user_id: i64, log_id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM logs WHERE id = ?1 AND user_id = ?2")
            .bind(log_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_calendar_link(&self, log_id: i64, link: &str) -> DbResult<()> {
        sqlx::query("UPDATE logs SET calendar_link = ?2 WHERE id = ?1")
            .bind(log_id)
            .bind(link)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn count_logs(&self, user_id: i64) -> DbResult<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM logs WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;
        Ok(row.0.max(0) as u64)
    }
}

fn attach_tags(rows: Vec<LogRow>, tags: Vec<LogTagRow>) -> DbResult<Vec<LogEntry>> {
    let mut by_log: HashMap<i64, Vec<String>> = HashMap::new();
    for tag in tags {
        by_log.entry(tag.log_id).or_default().push(tag.name);
    }
    rows.into_iter()
        .map(|row| {
            let tags = by_log.remove(&row.id()).unwrap_or_default();
            row.into_log_entry(tags)
        })
        .collect()
}
