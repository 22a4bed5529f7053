// crates/core/src/types.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A stored study/work session.
///
/// Owned by exactly one user. The aggregator only reads `date`, `duration`
/// and `tags`; everything else is carried for display and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Minutes.
    pub duration: u32,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impression: Option<String>,
    pub tags: Vec<String>,
    /// Unix seconds.
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_link: Option<String>,
}

/// Serialize times as `HH:MM`, the format the log form submits.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(d)?;
        crate::entry::parse_start_time(&s).map_err(serde::de::Error::custom)
    }
}
