// crates/db/src/queries/users.rs
//! Account rows: registration, lookup and login bookkeeping.

use sqlx::Row;

use crate::{Database, DbError, DbResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
    pub is_active: bool,
    pub is_admin: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<i64>,
    pub calendar_id: Option<String>,
    /// Unix seconds of the last password change; 0 if never changed.
    pub password_changed_at: i64,
}

impl User {
    pub fn is_locked(&self, now: i64) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for User {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        let attempts: i64 = row.try_get("failed_login_attempts")?;
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
            last_login: row.try_get("last_login")?,
            is_active: row.try_get("is_active")?,
            is_admin: row.try_get("is_admin")?,
            failed_login_attempts: attempts.max(0) as u32,
            locked_until: row.try_get("locked_until")?,
            calendar_id: row.try_get("calendar_id")?,
            password_changed_at: row.try_get("password_changed_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Already normalized (trimmed, lowercase).
    pub email: String,
    pub password_hash: String,
}

/// Outcome of a rejected login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginFailure {
    pub attempts: u32,
    /// Set when this failure tripped the lock.
    pub locked_until: Option<i64>,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, last_login, \
     is_active, is_admin, failed_login_attempts, locked_until, calendar_id, password_changed_at";

fn unique_violation_field(err: &sqlx::Error) -> Option<&'static str> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    let message = db_err.message();
    if message.contains("users.email") {
        Some("email")
    } else if message.contains("users.username") {
        Some("username")
    } else {
        None
    }
}

impl Database {
    /// Insert a user and seed their password history in one transaction.
    pub async fn create_user(&self, user: &NewUser) -> DbResult<User> {
        let mut tx = self.pool().begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(&mut *tx)
        .await;

        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e) => {
                return Err(match unique_violation_field(&e) {
                    Some(field) => DbError::Duplicate { field },
                    None => e.into(),
                })
            }
        };

        sqlx::query("INSERT INTO password_history (user_id, password_hash) VALUES (?1, ?2)")
            .bind(id)
            .bind(&user.password_hash)
            .execute(&mut *tx)
            .await?;

        let created: User = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    pub async fn find_user_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    /// Looks up by normalized email.
    pub async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    pub async fn username_exists(&self, username: &str) -> DbResult<bool> {
        let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)")
            .bind(username)
            .fetch_one(self.pool())
            .await?;
        Ok(row.0 != 0)
    }

    pub async fn email_exists(&self, email: &str) -> DbResult<bool> {
        let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)")
            .bind(email)
            .fetch_one(self.pool())
            .await?;
        Ok(row.0 != 0)
    }

    /// Clears the failure counter and any lock, stamps `last_login`.
    pub async fn record_login_success(&self, user_id: i64, now: i64) -> DbResult<()> {
        sqlx::query(
            "UPDATE users SET last_login = ?2, failed_login_attempts = 0, locked_until = NULL \
             WHERE id = ?1",
        )
        .bind(user_id)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Bumps the failure counter. Reaching `threshold` locks the account
    /// until `now + lock_secs` and starts the count over.
    pub async fn record_login_failure(
        &self,
        user_id: i64,
        now: i64,
        threshold: u32,
        lock_secs: i64,
    ) -> DbResult<LoginFailure> {
        let mut tx = self.pool().begin().await?;

        let row: (i64,) = sqlx::query_as(
            "UPDATE users SET failed_login_attempts = failed_login_attempts + 1 \
             WHERE id = ?1 RETURNING failed_login_attempts",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        let attempts = row.0.max(0) as u32;

        let locked_until = if attempts >= threshold {
            let until = now + lock_secs;
            sqlx::query(
                "UPDATE users SET failed_login_attempts = 0, locked_until = ?2 WHERE id = ?1",
            )
            .bind(user_id)
            .bind(until)
            .execute(&mut *tx)
            .await?;
            Some(until)
        } else {
            None
        };

        tx.commit().await?;
        Ok(LoginFailure {
            attempts,
            locked_until,
        })
    }

    /// `None` falls back to the server-wide calendar.
    pub async fn set_calendar_id(&self, user_id: i64, calendar_id: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE users SET calendar_id = ?2 WHERE id = ?1")
            .bind(user_id)
            .bind(calendar_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Enable or disable an account. Disabled users cannot log in and
    /// their existing sessions are refused. This is the hook for
    /// operator tooling; no HTTP route exposes it.
    pub async fn set_user_active(&self, user_id: i64, active: bool) -> DbResult<()> {
        sqlx::query("UPDATE users SET is_active = ?2 WHERE id = ?1")
            .bind(user_id)
            .bind(active)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
