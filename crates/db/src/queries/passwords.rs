// crates/db/src/queries/passwords.rs
//! Password history and single-use reset tokens.
//!
//! Reset tokens are stored as hashes only; the raw value exists solely in
//! the link sent to the user.

use crate::{Database, DbResult};

/// How many previous hashes a new password is checked against.
pub const PASSWORD_HISTORY_DEPTH: u32 = 5;

impl Database {
    /// Replace the password, record it in history, clear any lockout and
    /// stamp `password_changed_at` with `now`.
    pub async fn update_password(&self, user_id: i64, password_hash: &str, now: i64) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "UPDATE users SET password_hash = ?2, failed_login_attempts = 0, locked_until = NULL, \
             password_changed_at = ?3 WHERE id = ?1",
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO password_history (user_id, password_hash) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Most recent first. Includes the current password.
    pub async fn recent_password_hashes(&self, user_id: i64, limit: u32) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT password_hash FROM password_history WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(h,)| h).collect())
    }

    /// Store a new reset token. Any earlier unused token for the same
    /// user stops working.
    pub async fn create_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        now: i64,
        expires_at: i64,
    ) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("UPDATE password_reset_tokens SET used = 1 WHERE user_id = ?1 AND used = 0")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token_hash, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Owner of a redeemable token, without using it up.
    pub async fn peek_reset_token(&self, token_hash: &str, now: i64) -> DbResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM password_reset_tokens \
             WHERE token_hash = ?1 AND used = 0 AND expires_at > ?2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    /// Mark the token used and return its owner, in a single statement so
    /// two concurrent redemptions cannot both succeed.
    ///
    /// Returns `None` for unknown, expired or already used tokens.
    pub async fn consume_reset_token(&self, token_hash: &str, now: i64) -> DbResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE password_reset_tokens SET used = 1 \
             WHERE token_hash = ?1 AND used = 0 AND expires_at > ?2 \
             RETURNING user_id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    /// Drop tokens that can no longer be redeemed.
    pub async fn purge_expired_reset_tokens(&self, now: i64) -> DbResult<u64> {
        let result =
            sqlx::query("DELETE FROM password_reset_tokens WHERE used = 1 OR expires_at <= ?1")
                .bind(now)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected())
    }
}
