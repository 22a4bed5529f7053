//! Log entry endpoints: create, list, fetch, delete and export.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use worklog_core::{join_tags, LogEntry, LogInput, NewLogEntry};
use worklog_db::{User, LOG_PAGE_MAX};

use crate::auth::AuthUser;
use crate::calendar::CalendarEvent;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{record_calendar_sync, timed};
use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct CreatedLog {
    pub log: LogEntry,
    /// Plain-text summary the client can offer for sharing.
    pub share_text: String,
    pub calendar_link: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub logs: Vec<LogEntry>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Push the entry to the user's calendar, or the server default one.
///
/// Returns the event link on success. Any failure is logged and counted,
/// never propagated: the entry is already stored.
async fn sync_to_calendar(state: &AppState, user: &User, entry: &NewLogEntry) -> Option<String> {
    let calendar = state.calendar.as_ref()?;
    let calendar_id = user
        .calendar_id
        .as_deref()
        .unwrap_or(&state.config.calendar_id);
    let event = CalendarEvent::for_entry(entry, &state.config.calendar_timezone);

    let start = Instant::now();
    match calendar.insert_event(calendar_id, &event).await {
        Ok(link) => {
            record_calendar_sync("ok", start.elapsed());
            link
        }
        Err(e) => {
            record_calendar_sync("error", start.elapsed());
            tracing::warn!(user_id = user.id, error = %e, "Calendar sync failed (non-fatal)");
            None
        }
    }
}

/// POST /api/logs
pub async fn create_log(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(input): Json<LogInput>,
) -> ApiResult<(StatusCode, Json<CreatedLog>)> {
    timed("logs_create", async {
        let entry = input.validate()?;
        let mut log = state.db.insert_log(user.id, &entry).await?;
        tracing::info!(user_id = user.id, log_id = log.id, minutes = entry.duration, "Log stored");

        let calendar_link = sync_to_calendar(&state, &user, &entry).await;
        if let Some(link) = &calendar_link {
            state.db.set_calendar_link(log.id, link).await?;
            log.calendar_link = Some(link.clone());
        }

        Ok((
            StatusCode::CREATED,
            Json(CreatedLog {
                log,
                share_text: entry.share_text(),
                calendar_link,
            }),
        ))
    })
    .await
}

/// GET /api/logs?limit=&offset=
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<LogPage>> {
    timed("logs_list", async {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, LOG_PAGE_MAX);
        let offset = query.offset.unwrap_or(0);
        let logs = state.db.list_logs(user.id, limit, offset).await?;
        let total = state.db.count_logs(user.id).await?;
        Ok(Json(LogPage {
            logs,
            total,
            limit,
            offset,
        }))
    })
    .await
}

/// GET /api/logs/{id}
pub async fn get_log(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<LogEntry>> {
    timed("logs_get", async {
        state
            .db
            .get_log(user.id, id)
            .await?
            .map(Json)
            .ok_or_else(|| ApiError::NotFound(format!("log {id}")))
    })
    .await
}

/// DELETE /api/logs/{id}
pub async fn delete_log(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    timed("logs_delete", async {
        if !state.db.delete_log(user.id, id).await? {
            return Err(ApiError::NotFound(format!("log {id}")));
        }
        tracing::info!(user_id = user.id, log_id = id, "Log deleted");
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ExportQuery {
    /// "json" (default) or "csv"
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub logs: Vec<LogEntry>,
    pub exported_at: i64,
    pub total_count: usize,
}

/// GET /api/logs/export?format=json|csv
///
/// Every entry the caller owns, oldest first.
pub async fn export_logs(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    timed("logs_export", async {
        let format = query.format.unwrap_or_else(|| "json".to_string());
        if format != "json" && format != "csv" {
            return Err(ApiError::BadRequest(format!(
                "Invalid format '{format}'. Valid options: json, csv"
            )));
        }

        let logs = state.db.all_logs(user.id).await?;
        match format.as_str() {
            "csv" => Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"worklog.csv\"",
                    ),
                ],
                build_csv(&logs),
            )
                .into_response()),
            _ => Ok(Json(ExportResponse {
                total_count: logs.len(),
                exported_at: state.clock.timestamp(),
                logs,
            })
            .into_response()),
        }
    })
    .await
}

const CSV_HEADER: &str = "date,start_time,duration,content,impression,tags,calendar_link";

fn build_csv(logs: &[LogEntry]) -> String {
    let mut csv = String::with_capacity(64 * (logs.len() + 1));
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for log in logs {
        let row = [
            log.date.format("%Y-%m-%d").to_string(),
            log.start_time.format("%H:%M").to_string(),
            log.duration.to_string(),
            escape_csv_field(&log.content),
            escape_csv_field(log.impression.as_deref().unwrap_or("")),
            escape_csv_field(&join_tags(&log.tags)),
            escape_csv_field(log.calendar_link.as_deref().unwrap_or("")),
        ];
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}

/// RFC 4180 quoting: wrap in quotes when the field has a comma, quote or
/// line break, doubling inner quotes.
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logs", get(list_logs).post(create_log))
        .route("/logs/export", get(export_logs))
        .route("/logs/{id}", get(get_log).delete(delete_log))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{send, send_raw, seed_user, test_state, test_state_with, TestCalendar};
    use axum::http::Method;
    use serde_json::json;

    fn app(state: Arc<AppState>) -> Router {
        crate::create_app(state)
    }

    fn body(date: &str, minutes: u32, tags: &str) -> serde_json::Value {
        json!({
            "date": date,
            "startTime": "21:00",
            "duration": minutes,
            "content": format!("work on {date}"),
            "impression": "ok",
            "tags": tags
        })
    }

    #[tokio::test]
    async fn test_create_log_returns_share_text() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "ada").await;

        let (status, created) = send(
            app(state),
            Method::POST,
            "/api/logs",
            Some(&token),
            Some(body("2025-01-03", 45, "Rust, Axum ,")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(created["log"]["tags"], json!(["Rust", "Axum"]));
        assert_eq!(created["log"]["startTime"], "21:00");
        assert!(created["shareText"].as_str().unwrap().contains("45 min"));
        assert!(created["calendarLink"].is_null());
    }

    #[tokio::test]
    async fn test_create_log_validation() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "ada").await;

        for bad in [
            json!({"date": "2025-13-01", "startTime": "10:00", "duration": 10, "content": "x"}),
            json!({"date": "2025-01-01", "startTime": "10:00", "duration": -5, "content": "x"}),
            json!({"date": "2025-01-01", "startTime": "10:00", "duration": "1.5", "content": "x"}),
            json!({"date": "2025-01-01", "startTime": "10:00", "duration": 1.5, "content": "x"}),
            json!({"date": "2025-01-01", "startTime": "10:00", "duration": 30.0, "content": "x"}),
            json!({"date": "2025-01-01", "startTime": "10:00", "duration": 10, "content": "  "}),
        ] {
            let (status, body) =
                send(app(state.clone()), Method::POST, "/api/logs", Some(&token), Some(bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert!(body["error"].is_string(), "{body}");
        }
        assert_eq!(state.db.count_logs(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_requires_auth() {
        let state = test_state().await;
        let (status, _) = send(
            app(state),
            Method::POST,
            "/api/logs",
            None,
            Some(body("2025-01-03", 45, "")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_calendar_sync_stores_link() {
        let calendar = Arc::new(TestCalendar::default());
        let state = test_state_with(Some(calendar.clone()), Arc::new(crate::mailer::LogMailer)).await;
        let (_, token) = seed_user(&state, "ada").await;

        let (status, created) = send(
            app(state.clone()),
            Method::POST,
            "/api/logs",
            Some(&token),
            Some(body("2025-01-03", 30, "Rust")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["calendarLink"], "https://calendar.test/event/1");

        let events = calendar.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "primary");
        assert_eq!(events[0].1.summary, "Study: work on 2025-01-03  #Rust");

        let id = created["log"]["id"].as_i64().unwrap();
        let (_, fetched) = send(app(state), Method::GET, &format!("/api/logs/{id}"), Some(&token), None).await;
        assert_eq!(fetched["calendarLink"], "https://calendar.test/event/1");
    }

    #[tokio::test]
    async fn test_user_calendar_overrides_default() {
        let calendar = Arc::new(TestCalendar::default());
        let state = test_state_with(Some(calendar.clone()), Arc::new(crate::mailer::LogMailer)).await;
        let (user, token) = seed_user(&state, "ada").await;
        state
            .db
            .set_calendar_id(user.id, Some("ada@group.calendar.google.com"))
            .await
            .unwrap();

        send(app(state), Method::POST, "/api/logs", Some(&token), Some(body("2025-01-03", 30, ""))).await;
        let events = calendar.events.lock().unwrap();
        assert_eq!(events[0].0, "ada@group.calendar.google.com");
    }

    #[tokio::test]
    async fn test_calendar_failure_does_not_fail_request() {
        let calendar = Arc::new(TestCalendar::failing());
        let state = test_state_with(Some(calendar), Arc::new(crate::mailer::LogMailer)).await;
        let (user, token) = seed_user(&state, "ada").await;

        let (status, created) = send(
            app(state.clone()),
            Method::POST,
            "/api/logs",
            Some(&token),
            Some(body("2025-01-03", 30, "")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["calendarLink"].is_null());
        assert_eq!(state.db.count_logs(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_get_delete_scoped_to_owner() {
        let state = test_state().await;
        let (_, ada) = seed_user(&state, "ada").await;
        let (_, grace) = seed_user(&state, "grace").await;

        let (_, created) = send(
            app(state.clone()),
            Method::POST,
            "/api/logs",
            Some(&ada),
            Some(body("2025-01-02", 20, "")),
        )
        .await;
        send(app(state.clone()), Method::POST, "/api/logs", Some(&ada), Some(body("2025-01-03", 25, ""))).await;
        let id = created["log"]["id"].as_i64().unwrap();
        let uri = format!("/api/logs/{id}");

        let (_, page) = send(app(state.clone()), Method::GET, "/api/logs?limit=1", Some(&ada), None).await;
        assert_eq!(page["total"], 2);
        assert_eq!(page["logs"].as_array().unwrap().len(), 1);
        assert_eq!(page["logs"][0]["date"], "2025-01-03");

        let (_, page) = send(app(state.clone()), Method::GET, "/api/logs", Some(&grace), None).await;
        assert_eq!(page["total"], 0);

        let (status, _) = send(app(state.clone()), Method::GET, &uri, Some(&grace), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(app(state.clone()), Method::DELETE, &uri, Some(&grace), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(app(state.clone()), Method::DELETE, &uri, Some(&ada), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(app(state), Method::GET, &uri, Some(&ada), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_csv_and_json() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "ada").await;
        send(
            app(state.clone()),
            Method::POST,
            "/api/logs",
            Some(&token),
            Some(json!({
                "date": "2025-01-03",
                "startTime": "09:30",
                "duration": 15,
                "content": "said \"hi\", left",
                "tags": "a, b"
            })),
        )
        .await;

        let (status, csv) =
            send_raw(app(state.clone()), Method::GET, "/api/logs/export?format=csv", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("2025-01-03,09:30,15,\"said \"\"hi\"\", left\",,\"a,b\",")
        );

        let (status, json) = send(app(state.clone()), Method::GET, "/api/logs/export", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["totalCount"], 1);

        let (status, _) =
            send(app(state), Method::GET, "/api/logs/export?format=xml", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_escape_csv_field() {
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("line\nbreak"), "\"line\nbreak\"");
    }
}
