//! API route handlers for the worklog server.

pub mod auth;
pub mod health;
pub mod logs;
pub mod metrics;
pub mod settings;
pub mod stats;
pub mod tags;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET    /api/health - Health check
/// - GET    /api/metrics - Prometheus metrics
/// - POST   /api/auth/register - Create an account
/// - POST   /api/auth/login - Exchange credentials for a session token
/// - GET    /api/auth/me - Current user's profile
/// - POST   /api/auth/password - Change password
/// - POST   /api/auth/password/forgot - Email a reset link
/// - POST   /api/auth/password/reset - Set a new password from a reset token
/// - GET    /api/logs - Paginated entries, newest first
/// - POST   /api/logs - Record an entry (and sync it to the calendar)
/// - GET    /api/logs/export - Export all entries as JSON or CSV
/// - GET    /api/logs/{id} - One entry
/// - DELETE /api/logs/{id} - Delete an entry
/// - GET    /api/stats - Total minutes, active days and streak
/// - GET    /api/stats/data - Per-day totals and tag counts
/// - GET    /api/dashboard - Dashboard stats and chart series
/// - GET    /api/tags/suggest - Tag names for autocomplete
/// - GET    /api/tags/top - Most used tags
/// - PUT    /api/settings/calendar - Choose the calendar for sync
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", metrics::router())
        .nest("/api", auth::router())
        .nest("/api", logs::router())
        .nest("/api", stats::router())
        .nest("/api", tags::router())
        .nest("/api", settings::router())
        .with_state(state)
}
