// crates/server/src/lib.rs
//! Worklog server library.
//!
//! Axum HTTP server for the worklog application: accounts, activity log
//! entries, aggregate statistics and optional calendar sync, all under
//! `/api`.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod mailer;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::*;
pub use metrics::{init_metrics, record_request, render_metrics};
pub use routes::api_routes;
pub use state::{AppState, Clock};

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes under `/api`
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
