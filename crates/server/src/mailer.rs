// crates/server/src/mailer.rs
//! Outbound mail. Delivery itself is left to an external relay; the
//! default implementation only records the message in the log.

use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, email: &str, reset_url: &str) -> anyhow::Result<()>;
}

/// Writes reset links to the log instead of sending mail.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
        tracing::info!(
            to = %email,
            reset_url = %reset_url,
            "Password reset requested; link valid for one hour"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryMailer {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MemoryMailer {
    pub fn last_url(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, url)| url.clone())
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_password_reset(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), reset_url.to_string()));
        Ok(())
    }
}
