// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use worklog_db::Database;

use crate::auth::SessionKeys;
use crate::calendar::CalendarSink;
use crate::config::Config;
use crate::mailer::{LogMailer, Mailer};

/// Source of "now". Aggregation takes `today` from here instead of reading
/// the system clock, so tests can pin it.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    /// Fixed local wall-clock time.
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn local_now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(t) => *t,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.local_now().date()
    }

    /// Unix seconds, for token expiry and lockouts.
    pub fn timestamp(&self) -> i64 {
        match self {
            Clock::System => Utc::now().timestamp(),
            Clock::Fixed(t) => t.and_utc().timestamp(),
        }
    }
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub db: Database,
    pub config: Config,
    /// Signing keys for session tokens.
    pub keys: SessionKeys,
    pub clock: Clock,
    /// `None` when calendar sync is not configured.
    pub calendar: Option<Arc<dyn CalendarSink>>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// State with the system clock, no calendar and the logging mailer.
    pub fn new(db: Database, config: Config) -> Arc<Self> {
        Self::with_parts(db, config, Clock::System, None, Arc::new(LogMailer))
    }

    pub fn with_parts(
        db: Database,
        config: Config,
        clock: Clock,
        calendar: Option<Arc<dyn CalendarSink>>,
        mailer: Arc<dyn Mailer>,
    ) -> Arc<Self> {
        let keys = match config.secret.as_deref() {
            Some(secret) => SessionKeys::from_secret(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "No session secret configured; using a random one. Sessions will not survive a restart."
                );
                SessionKeys::random()
            }
        };
        Arc::new(Self {
            start_time: Instant::now(),
            db,
            config,
            keys,
            clock,
            calendar,
            mailer,
        })
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
