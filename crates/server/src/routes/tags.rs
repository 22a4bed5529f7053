//! Tag suggestions for the entry form and the top-tags widget.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use worklog_core::{rank_tags, TagMetric};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::metrics::timed;
use crate::state::AppState;

pub const SUGGEST_LIMIT: usize = 20;
pub const TOP_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
pub struct TopTag {
    pub tag: String,
    pub count: u64,
}

/// GET /api/tags/suggest
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<String>>> {
    timed("tags_suggest", async {
        let entries = state.db.all_logs(user.id).await?;
        let names = rank_tags(&entries, TagMetric::Count, SUGGEST_LIMIT)
            .into_iter()
            .map(|t| t.tag)
            .collect();
        Ok(Json(names))
    })
    .await
}

/// GET /api/tags/top
pub async fn top(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<TopTag>>> {
    timed("tags_top", async {
        let entries = state.db.all_logs(user.id).await?;
        let top = rank_tags(&entries, TagMetric::Count, TOP_LIMIT)
            .into_iter()
            .map(|t| TopTag {
                tag: t.tag,
                count: t.value,
            })
            .collect();
        Ok(Json(top))
    })
    .await
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags/suggest", get(suggest))
        .route("/tags/top", get(top))
}
