// crates/server/src/calendar.rs
//! Mirror new log entries into a calendar as timed events.
//!
//! The Google implementation authenticates as a service account: it signs
//! an RS256 assertion with the account's private key, trades it for a
//! short-lived access token and caches that token until shortly before it
//! expires.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use worklog_core::NewLogEntry;

pub const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";
const ASSERTION_TTL_SECS: i64 = 3600;
/// Refresh this long before the token actually expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Failed to read service account file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid service account JSON: {0}")]
    Credentials(#[from] serde_json::Error),

    #[error("Failed to sign token assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Calendar request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

/// Request body for an event insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
}

impl CalendarEvent {
    /// Event spanning the entry's start time plus its duration.
    pub fn for_entry(entry: &NewLogEntry, time_zone: &str) -> Self {
        let start = entry.starts_at();
        let end = start + ChronoDuration::minutes(i64::from(entry.duration));
        let at = |t: chrono::NaiveDateTime| EventTime {
            date_time: t.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: time_zone.to_string(),
        };
        Self {
            summary: event_summary(entry),
            description: entry.impression.clone().unwrap_or_default(),
            start: at(start),
            end: at(end),
        }
    }
}

/// `Study: <content>  #tag1 #tag2`
pub fn event_summary(entry: &NewLogEntry) -> String {
    let tags: Vec<String> = entry.tags.iter().map(|t| format!("#{t}")).collect();
    format!("Study: {}  {}", entry.content, tags.join(" "))
        .trim_end()
        .to_string()
}

#[async_trait]
pub trait CalendarSink: Send + Sync {
    /// Create the event and return a link to it when the provider gives one.
    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<Option<String>, CalendarError>;
}

/// The fields of a Google service account key file that we use.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    #[serde(default)]
    html_link: Option<String>,
}

struct CachedToken {
    value: String,
    valid_until: Instant,
}

pub struct GoogleCalendar {
    client: reqwest::Client,
    client_email: String,
    key_id: Option<String>,
    key: EncodingKey,
    api_base: String,
    token_uri: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleCalendar {
    pub fn from_file(path: &Path) -> Result<Self, CalendarError> {
        let raw = std::fs::read_to_string(path)?;
        let account: ServiceAccount = serde_json::from_str(&raw)?;
        Self::new(account)
    }

    pub fn new(account: ServiceAccount) -> Result<Self, CalendarError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            client_email: account.client_email,
            key_id: account.private_key_id,
            key,
            api_base: GOOGLE_API_BASE.to_string(),
            token_uri: account
                .token_uri
                .unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string()),
            token: Mutex::new(None),
        })
    }

    /// Point at a different API host (used against a local mock server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(calendar_id)
        )
    }

    fn sign_assertion(&self) -> Result<String, CalendarError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: CALENDAR_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        Ok(encode(&header, &claims, &self.key)?)
    }

    async fn access_token(&self) -> Result<String, CalendarError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.valid_until {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.sign_assertion()?;
        let response: TokenResponse = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        tracing::debug!(expires_in = response.expires_in, "Fetched calendar access token");
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            valid_until: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }
}

#[async_trait]
impl CalendarSink for GoogleCalendar {
    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<Option<String>, CalendarError> {
        let token = self.access_token().await?;
        let inserted: InsertedEvent = self
            .client
            .post(self.events_url(calendar_id))
            .bearer_auth(token)
            .json(event)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(inserted.html_link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;

    const SERVICE_ACCOUNT: &str = include_str!("../testdata/service_account.json");

    fn entry(tags: &[&str]) -> NewLogEntry {
        NewLogEntry {
            date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(23, 30, 0).unwrap(),
            duration: 90,
            content: "Read the tokio book".to_string(),
            impression: Some("channels finally clicked".to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn account_for(server: &mockito::Server) -> ServiceAccount {
        let mut account: ServiceAccount = serde_json::from_str(SERVICE_ACCOUNT).unwrap();
        account.token_uri = Some(format!("{}/token", server.url()));
        account
    }

    #[test]
    fn test_event_for_entry_crosses_midnight() {
        let event = CalendarEvent::for_entry(&entry(&["Rust", "tokio"]), "Asia/Tokyo");
        assert_eq!(event.summary, "Study: Read the tokio book  #Rust #tokio");
        assert_eq!(event.description, "channels finally clicked");
        assert_eq!(event.start.date_time, "2025-01-03T23:30:00");
        assert_eq!(event.end.date_time, "2025-01-04T01:00:00");
        assert_eq!(event.end.time_zone, "Asia/Tokyo");
    }

    #[test]
    fn test_summary_without_tags() {
        assert_eq!(event_summary(&entry(&[])), "Study: Read the tokio book");
    }

    #[test]
    fn test_event_json_shape() {
        let event = CalendarEvent::for_entry(&entry(&[]), "UTC");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["start"]["dateTime"], "2025-01-03T23:30:00");
        assert_eq!(json["start"]["timeZone"], "UTC");
    }

    #[test]
    fn test_events_url_escapes_calendar_id() {
        let account: ServiceAccount = serde_json::from_str(SERVICE_ACCOUNT).unwrap();
        let calendar = GoogleCalendar::new(account)
            .unwrap()
            .with_api_base("http://calendar.test/v3/");
        assert_eq!(
            calendar.events_url("team@group.calendar.google.com"),
            "http://calendar.test/v3/calendars/team%40group.calendar.google.com/events"
        );
    }

    #[test]
    fn test_bad_private_key_rejected() {
        let mut account: ServiceAccount = serde_json::from_str(SERVICE_ACCOUNT).unwrap();
        account.private_key = "not a key".to_string();
        assert!(matches!(
            GoogleCalendar::new(account),
            Err(CalendarError::Jwt(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_event_reuses_token() {
        let mut server = mockito::Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3600,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;
        let event_mock = server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer ya29.test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"evt1","htmlLink":"https://calendar.example/event?eid=evt1"}"#)
            .expect(2)
            .create_async()
            .await;

        let calendar = GoogleCalendar::new(account_for(&server))
            .unwrap()
            .with_api_base(server.url());
        let event = CalendarEvent::for_entry(&entry(&["Rust"]), "Asia/Tokyo");

        for _ in 0..2 {
            let link = calendar.insert_event("primary", &event).await.unwrap();
            assert_eq!(link.as_deref(), Some("https://calendar.example/event?eid=evt1"));
        }

        token_mock.assert_async().await;
        event_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_insert_event_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3600}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/calendars/primary/events")
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"forbidden"}}"#)
            .create_async()
            .await;

        let calendar = GoogleCalendar::new(account_for(&server))
            .unwrap()
            .with_api_base(server.url());
        let event = CalendarEvent::for_entry(&entry(&[]), "UTC");
        let err = calendar.insert_event("primary", &event).await.unwrap_err();
        assert!(matches!(err, CalendarError::Http(_)));
    }

    #[tokio::test]
    async fn test_token_exchange_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let calendar = GoogleCalendar::new(account_for(&server))
            .unwrap()
            .with_api_base(server.url());
        let event = CalendarEvent::for_entry(&entry(&[]), "UTC");
        assert!(calendar.insert_event("primary", &event).await.is_err());
    }
}
