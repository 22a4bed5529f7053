//! Fixtures shared by the query integration tests.

use chrono::{NaiveDate, NaiveTime};
use worklog_core::NewLogEntry;
use worklog_db::{Database, NewUser};

pub async fn make_user(db: &Database, name: &str) -> i64 {
    db.create_user(&NewUser {
        username: name.to_string(),
        email: format!("{name}@example.com"),
        password_hash: format!("hash-{name}"),
    })
    .await
    .unwrap()
    .id
}

pub fn make_entry(date: &str, minutes: u32, tags: &[&str]) -> NewLogEntry {
    NewLogEntry {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        duration: minutes,
        content: format!("session on {date}"),
        impression: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}
