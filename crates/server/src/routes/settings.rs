//! Per-user settings.

use std::sync::Arc;

use axum::{extract::State, routing::put, Json, Router};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics::timed;
use crate::routes::auth::UserProfile;
use crate::state::AppState;

/// Longest calendar id accepted.
const CALENDAR_ID_MAX: usize = 255;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSettings {
    /// `null` or blank reverts to the server default calendar.
    #[serde(default)]
    pub calendar_id: Option<String>,
}

/// PUT /api/settings/calendar
pub async fn update_calendar(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CalendarSettings>,
) -> ApiResult<Json<UserProfile>> {
    timed("settings_calendar", async {
        let calendar_id = req
            .calendar_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if calendar_id
            .is_some_and(|id| id.len() > CALENDAR_ID_MAX || id.contains(char::is_whitespace))
        {
            return Err(ApiError::BadRequest(
                "calendarId is not a valid calendar id".to_string(),
            ));
        }

        state.db.set_calendar_id(user.id, calendar_id).await?;
        tracing::info!(user_id = user.id, custom = calendar_id.is_some(), "Calendar setting updated");

        let user = state
            .db
            .find_user_by_id(user.id)
            .await?
            .ok_or_else(|| ApiError::NotFound("user".to_string()))?;
        Ok(Json(UserProfile::from(&user)))
    })
    .await
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/settings/calendar", put(update_calendar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{send, seed_user, test_state};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_clear_calendar() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "ada").await;

        let (status, body) = send(
            crate::create_app(state.clone()),
            Method::PUT,
            "/api/settings/calendar",
            Some(&token),
            Some(json!({"calendarId": " ada@group.calendar.google.com "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["calendarId"], "ada@group.calendar.google.com");

        let (_, body) = send(
            crate::create_app(state.clone()),
            Method::PUT,
            "/api/settings/calendar",
            Some(&token),
            Some(json!({"calendarId": null})),
        )
        .await;
        assert!(body["calendarId"].is_null());

        let (status, _) = send(
            crate::create_app(state),
            Method::PUT,
            "/api/settings/calendar",
            Some(&token),
            Some(json!({"calendarId": "has space"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
