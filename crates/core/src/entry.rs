//! Log entry creation: parse and validate the submitted form.
//!
//! Malformed input is rejected here so that everything stored is already
//! well-typed. The aggregator never has to deal with a bad duration.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::error::ValidationError;
use crate::tags::parse_tags;

/// Upper bound for a single session, in minutes.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;
pub const MAX_CONTENT_CHARS: usize = 2000;
pub const MAX_IMPRESSION_CHARS: usize = 4000;

/// Duration as submitted: JSON clients send a number, form posts send text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Minutes(i64),
    /// Any non-integer number; always rejected.
    Float(f64),
    Text(String),
}

impl DurationInput {
    fn parse(&self) -> Result<u32, ValidationError> {
        let minutes = match self {
            DurationInput::Minutes(m) => *m,
            DurationInput::Float(f) => {
                return Err(ValidationError::invalid_duration(f.to_string(), MAX_DURATION_MINUTES));
            }
            DurationInput::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ValidationError::invalid_duration(s.clone(), MAX_DURATION_MINUTES))?,
        };
        if !(0..=MAX_DURATION_MINUTES as i64).contains(&minutes) {
            return Err(ValidationError::invalid_duration(
                minutes.to_string(),
                MAX_DURATION_MINUTES,
            ));
        }
        Ok(minutes as u32)
    }
}

/// Raw log submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInput {
    pub date: String,
    pub start_time: String,
    pub duration: DurationInput,
    pub content: String,
    #[serde(default)]
    pub impression: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// A validated entry, ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration: u32,
    pub content: String,
    pub impression: Option<String>,
    pub tags: Vec<String>,
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_start_time(value: &str) -> Result<NaiveTime, ValidationError> {
    let v = value.trim();
    NaiveTime::parse_from_str(v, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(v, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidTime {
            value: value.to_string(),
        })
}

impl LogInput {
    pub fn validate(&self) -> Result<NewLogEntry, ValidationError> {
        let date = parse_date(&self.date)?;
        let start_time = parse_start_time(&self.start_time)?;
        let duration = self.duration.parse()?;

        let content = self.content.trim();
        if content.is_empty() {
            return Err(ValidationError::Required { field: "content" });
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(ValidationError::TooLong {
                field: "content",
                max: MAX_CONTENT_CHARS,
            });
        }

        let impression = self
            .impression
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if impression.is_some_and(|s| s.chars().count() > MAX_IMPRESSION_CHARS) {
            return Err(ValidationError::TooLong {
                field: "impression",
                max: MAX_IMPRESSION_CHARS,
            });
        }

        Ok(NewLogEntry {
            date,
            start_time,
            duration,
            content: content.to_string(),
            impression: impression.map(str::to_string),
            tags: self.tags.as_deref().map(parse_tags).unwrap_or_default(),
        })
    }
}

impl NewLogEntry {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// Plain-text summary shown after submitting, suitable for sharing.
    pub fn share_text(&self) -> String {
        let tags = if self.tags.is_empty() {
            "none".to_string()
        } else {
            self.tags.join(", ")
        };
        format!(
            "#WorkLog\nDone:     {}\nTags:     {}\nTime:     {} min\nDate:     {}\nMemo:     {}\n",
            self.content,
            tags,
            self.duration,
            self.date.format("%Y-%m-%d"),
            self.impression.as_deref().unwrap_or(""),
        )
    }
}
