// crates/db/src/queries/row_types.rs
// Internal row types. Dates and times are stored as TEXT and parsed on the
// way out so the rest of the crate only sees chrono values.

use sqlx::Row;
use worklog_core::{parse_date, parse_start_time, LogEntry};

use crate::{DbError, DbResult};

#[derive(Debug)]
pub(crate) struct LogRow {
    id: i64,
    user_id: i64,
    date: String,
    start_time: String,
    duration: i64,
    content: String,
    impression: Option<String>,
    created_at: i64,
    calendar_link: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for LogRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            date: row.try_get("date")?,
            start_time: row.try_get("start_time")?,
            duration: row.try_get("duration")?,
            content: row.try_get("content")?,
            impression: row.try_get("impression")?,
            created_at: row.try_get("created_at")?,
            calendar_link: row.try_get("calendar_link")?,
        })
    }
}

impl LogRow {
    pub(crate) fn id(&self) -> i64 {
        self.id
    }

    pub(crate) fn into_log_entry(self, tags: Vec<String>) -> DbResult<LogEntry> {
        let invalid = |reason: String| DbError::InvalidRow {
            table: "logs",
            reason,
        };
        let date = parse_date(&self.date).map_err(|e| invalid(e.to_string()))?;
        let start_time = parse_start_time(&self.start_time).map_err(|e| invalid(e.to_string()))?;
        let duration = u32::try_from(self.duration)
            .map_err(|_| invalid(format!("negative duration {} on log {}", self.duration, self.id)))?;

        Ok(LogEntry {
            id: self.id,
            user_id: self.user_id,
            date,
            start_time,
            duration,
            content: self.content,
            impression: self.impression,
            tags,
            created_at: self.created_at,
            calendar_link: self.calendar_link,
        })
    }
}

/// One `(log_id, tag name)` pair, in stored order.
#[derive(Debug)]
pub(crate) struct LogTagRow {
    pub(crate) log_id: i64,
    pub(crate) name: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for LogTagRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            log_id: row.try_get("log_id")?,
            name: row.try_get("name")?,
        })
    }
}
