// crates/server/src/config.rs
//! Runtime configuration. Every flag can also come from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_PORT: u16 = 47900;

/// Personal activity log server
#[derive(Parser, Debug, Clone)]
#[command(name = "worklog")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "WORKLOG_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "WORKLOG_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// SQLite database file (defaults to the platform data directory)
    #[arg(long, env = "WORKLOG_DATABASE")]
    pub database: Option<PathBuf>,

    /// Secret used to sign session tokens. A random one is generated when
    /// unset, which logs everyone out on restart.
    #[arg(long, env = "WORKLOG_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Externally visible base URL, used in password reset links
    #[arg(long, env = "WORKLOG_PUBLIC_URL", default_value = "http://localhost:47900")]
    pub public_url: String,

    /// Service account JSON for calendar sync. Sync is off without it.
    #[arg(long, env = "WORKLOG_SERVICE_CREDENTIALS")]
    pub service_credentials: Option<PathBuf>,

    /// Calendar that receives events unless a user picked their own
    #[arg(long, env = "WORKLOG_CALENDAR_ID", default_value = "primary")]
    pub calendar_id: String,

    /// IANA time zone attached to calendar events
    #[arg(long, env = "WORKLOG_CALENDAR_TZ", default_value = "Asia/Tokyo")]
    pub calendar_timezone: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "WORKLOG_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Reset link for a raw token.
    pub fn reset_url(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.public_url.trim_end_matches('/'),
            token
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            database: None,
            secret: None,
            public_url: format!("http://localhost:{DEFAULT_PORT}"),
            service_credentials: None,
            calendar_id: "primary".to_string(),
            calendar_timezone: "Asia/Tokyo".to_string(),
            log_json: false,
        }
    }
}
