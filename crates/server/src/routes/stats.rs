//! Aggregate views over the caller's entries: headline stats, chart data
//! and the dashboard payload.
//!
//! Each request loads the user's entries once and runs the pure
//! aggregation functions from `worklog_core` with the state clock's date.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use worklog_core::{
    daily_totals, dashboard, rank_tags, summarize, ActivitySummary, Dashboard, TagMetric,
};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::metrics::timed;
use crate::state::AppState;

/// GET /api/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<ActivitySummary>> {
    timed("stats", async {
        let entries = state.db.all_logs(user.id).await?;
        Ok(Json(summarize(&entries, state.clock.today())))
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub duration: u64,
}

#[derive(Debug, Serialize)]
pub struct TagShare {
    pub tag: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsData {
    pub daily: Vec<DailyPoint>,
    pub tag_share: Vec<TagShare>,
}

/// GET /api/stats/data
///
/// Per-day totals for every active date plus how many entries carry each
/// tag.
pub async fn stats_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<StatsData>> {
    timed("stats_data", async {
        let entries = state.db.all_logs(user.id).await?;
        let daily = daily_totals(&entries)
            .into_iter()
            .map(|p| DailyPoint {
                date: p.label,
                duration: p.duration,
            })
            .collect();
        let tag_share = rank_tags(&entries, TagMetric::Count, usize::MAX)
            .into_iter()
            .map(|t| TagShare {
                tag: t.tag,
                count: t.value,
            })
            .collect();
        Ok(Json(StatsData { daily, tag_share }))
    })
    .await
}

/// GET /api/dashboard
pub async fn dashboard_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Dashboard>> {
    timed("dashboard", async {
        let entries = state.db.all_logs(user.id).await?;
        tracing::debug!(user_id = user.id, entries = entries.len(), "Building dashboard");
        Ok(Json(dashboard(&entries, state.clock.today())))
    })
    .await
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(stats))
        .route("/stats/data", get(stats_data))
        .route("/dashboard", get(dashboard_data))
}
