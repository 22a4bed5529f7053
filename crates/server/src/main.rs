// crates/server/src/main.rs
//! Worklog server binary.
//!
//! Opens the database, wires up the optional calendar sync and serves the
//! API. A background task purges expired password reset tokens.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use worklog_db::{default_db_path, Database};
use worklog_server::calendar::{CalendarSink, GoogleCalendar};
use worklog_server::mailer::LogMailer;
use worklog_server::{create_app, init_metrics, AppState, Clock, Config};

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("worklog_server=info,worklog_db=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

/// Load the service account, or run without calendar sync.
fn load_calendar(config: &Config) -> Option<Arc<dyn CalendarSink>> {
    let path = config.service_credentials.as_deref()?;
    match GoogleCalendar::from_file(path) {
        Ok(calendar) => {
            tracing::info!(path = %path.display(), calendar_id = %config.calendar_id, "Calendar sync enabled");
            Some(Arc::new(calendar))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Calendar sync disabled: bad service account");
            None
        }
    }
}

fn spawn_token_purge(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match state.db.purge_expired_reset_tokens(state.clock.timestamp()).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(purged = n, "Expired reset tokens removed"),
                Err(e) => tracing::warn!(error = %e, "Reset token purge failed (non-fatal)"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);
    init_metrics();

    let db_path = match &config.database {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    let db = Database::new(&db_path).await?;
    tracing::info!(path = %db_path.display(), "Database ready");

    let calendar = load_calendar(&config);
    let addr = config.bind_addr();
    let state = AppState::with_parts(db, config, Clock::System, calendar, Arc::new(LogMailer));
    spawn_token_purge(state.clone());

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "worklog listening");

    axum::serve(listener, app).await?;
    Ok(())
}
