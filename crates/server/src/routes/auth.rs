//! Account endpoints: register, login, profile and password management.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use worklog_core::validation::{normalize_email, validate_new_password, validate_username};
use worklog_db::{NewUser, User, PASSWORD_HISTORY_DEPTH};

use crate::auth::{
    hash_password, hash_reset_token, issue_token, matches_any, new_reset_token, verify_password,
    verify_unknown_account, AuthUser, LOCKOUT_SECS, LOCKOUT_THRESHOLD, RESET_TOKEN_TTL_SECS,
};
use crate::error::{ApiError, ApiResult};
use crate::metrics::{record_login_failure, timed};
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// What clients get to see of an account.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
    pub is_admin: bool,
    pub calendar_id: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            created_at: u.created_at,
            last_login: u.last_login,
            is_admin: u.is_admin,
            calendar_id: u.calendar_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

async fn reject_reused_password(state: &AppState, user_id: i64, password: &str) -> ApiResult<()> {
    let recent = state
        .db
        .recent_password_hashes(user_id, PASSWORD_HISTORY_DEPTH)
        .await?;
    if matches_any(password, recent).await? {
        return Err(ApiError::BadRequest(format!(
            "Choose a password you have not used in your last {PASSWORD_HISTORY_DEPTH} changes"
        )));
    }
    Ok(())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    timed("auth_register", async {
        let username = validate_username(&req.username)?.to_string();
        let email = normalize_email(&req.email)?;
        validate_new_password(&req.password, &req.confirm_password)?;

        if state.db.username_exists(&username).await? {
            return Err(ApiError::Conflict("username is already taken".to_string()));
        }
        if state.db.email_exists(&email).await? {
            return Err(ApiError::Conflict("email is already registered".to_string()));
        }

        let user = state
            .db
            .create_user(&NewUser {
                username,
                email,
                password_hash: hash_password(&req.password).await?,
            })
            .await?;
        let token = issue_token(&state.keys, user.id, state.clock.timestamp(), false)?;

        tracing::info!(user_id = user.id, "User registered");
        Ok((
            StatusCode::CREATED,
            Json(AuthResponse {
                token,
                user: UserProfile::from(&user),
            }),
        ))
    })
    .await
}

/// POST /api/auth/login
///
/// Unknown email and wrong password produce the same 401. Repeated
/// failures lock the account for a while (423).
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    timed("auth_login", async {
        let now = state.clock.timestamp();
        let unauthorized = || ApiError::Unauthorized(BAD_CREDENTIALS.to_string());

        let user = match normalize_email(&req.email) {
            Ok(email) => state.db.find_user_by_email(&email).await?,
            Err(_) => None,
        };
        let Some(user) = user else {
            verify_unknown_account(&req.password).await?;
            return Err(unauthorized());
        };

        if let Some(until) = user.locked_until.filter(|_| user.is_locked(now)) {
            return Err(ApiError::Locked(until));
        }

        if !verify_password(&req.password, &user.password_hash).await? {
            let failure = state
                .db
                .record_login_failure(user.id, now, LOCKOUT_THRESHOLD, LOCKOUT_SECS)
                .await?;
            record_login_failure(failure.locked_until.is_some());
            tracing::warn!(user_id = user.id, attempts = failure.attempts, "Failed login");
            return Err(match failure.locked_until {
                Some(until) => ApiError::Locked(until),
                None => unauthorized(),
            });
        }

        if !user.is_active {
            return Err(ApiError::Forbidden("account is disabled".to_string()));
        }

        state.db.record_login_success(user.id, now).await?;
        let user = state.db.find_user_by_id(user.id).await?.ok_or_else(unauthorized)?;
        let token = issue_token(&state.keys, user.id, now, req.remember)?;

        tracing::info!(user_id = user.id, remember = req.remember, "User logged in");
        Ok(Json(AuthResponse {
            token,
            user: UserProfile::from(&user),
        }))
    })
    .await
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

/// POST /api/auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    timed("auth_change_password", async {
        if !verify_password(&req.current_password, &user.password_hash).await? {
            return Err(ApiError::BadRequest("current password is incorrect".to_string()));
        }
        validate_new_password(&req.new_password, &req.confirm_password)?;
        reject_reused_password(&state, user.id, &req.new_password).await?;

        state
            .db
            .update_password(
                user.id,
                &hash_password(&req.new_password).await?,
                state.clock.timestamp(),
            )
            .await?;
        tracing::info!(user_id = user.id, "Password changed");
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

/// POST /api/auth/password/forgot
///
/// Always 202 so the response does not reveal whether the email exists.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    timed("auth_forgot_password", async {
        let accepted = (
            StatusCode::ACCEPTED,
            Json(MessageResponse {
                message: "If that address is registered, a reset link is on its way.",
            }),
        );

        let Ok(email) = normalize_email(&req.email) else {
            return Ok(accepted);
        };
        let Some(user) = state.db.find_user_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(accepted);
        };
        if !user.is_active {
            return Ok(accepted);
        }

        let now = state.clock.timestamp();
        let (raw, hashed) = new_reset_token();
        state
            .db
            .create_reset_token(user.id, &hashed, now, now + RESET_TOKEN_TTL_SECS)
            .await?;

        let url = state.config.reset_url(&raw);
        if let Err(e) = state.mailer.send_password_reset(&user.email, &url).await {
            tracing::error!(user_id = user.id, error = %e, "Failed to send password reset mail");
        }
        Ok(accepted)
    })
    .await
}

/// POST /api/auth/password/reset
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<StatusCode> {
    timed("auth_reset_password", async {
        validate_new_password(&req.new_password, &req.confirm_password)?;

        let now = state.clock.timestamp();
        let hashed = hash_reset_token(req.token.trim());
        let invalid = || ApiError::BadRequest("reset link is invalid or has expired".to_string());

        let user_id = state
            .db
            .peek_reset_token(&hashed, now)
            .await?
            .ok_or_else(invalid)?;
        reject_reused_password(&state, user_id, &req.new_password).await?;

        // Consuming is the atomic step; a concurrent redemption loses here.
        let user_id = state
            .db
            .consume_reset_token(&hashed, now)
            .await?
            .ok_or_else(invalid)?;
        state
            .db
            .update_password(user_id, &hash_password(&req.new_password).await?, now)
            .await?;

        tracing::info!(user_id, "Password reset completed");
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/password", post(change_password))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MemoryMailer;
    use crate::test_support::{send, seed_user, test_state, test_state_with};
    use axum::http::Method;
    use serde_json::json;

    fn app(state: Arc<AppState>) -> Router {
        crate::create_app(state)
    }

    #[tokio::test]
    async fn test_register_then_me() {
        let state = test_state().await;
        let (status, body) = send(
            app(state.clone()),
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "ada",
                "email": "Ada@Example.com",
                "password": "hunter22x",
                "confirmPassword": "hunter22x"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["user"]["email"], "ada@example.com");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, me) = send(app(state), Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "ada");
        assert!(me.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_register_duplicates_and_validation() {
        let state = test_state().await;
        seed_user(&state, "ada").await;

        let (status, _) = send(
            app(state.clone()),
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "ada",
                "email": "new@example.com",
                "password": "hunter22x",
                "confirmPassword": "hunter22x"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            app(state),
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "grace",
                "email": "grace@example.com",
                "password": "short",
                "confirmPassword": "short"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
    }

    #[tokio::test]
    async fn test_login_and_lockout() {
        let state = test_state().await;
        let (user, _) = seed_user(&state, "ada").await;
        let login = |password: &'static str| {
            let state = state.clone();
            async move {
                send(
                    app(state),
                    Method::POST,
                    "/api/auth/login",
                    None,
                    Some(json!({"email": "ada@example.com", "password": password})),
                )
                .await
            }
        };

        let (status, body) = login("password1").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["token"].is_string());
        assert!(body["user"]["lastLogin"].is_number());

        for _ in 0..4 {
            let (status, body) = login("wrong-pass1").await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["details"], BAD_CREDENTIALS);
        }
        let (status, _) = login("wrong-pass1").await;
        assert_eq!(status, StatusCode::LOCKED);

        // Correct password is refused while locked.
        let (status, _) = login("password1").await;
        assert_eq!(status, StatusCode::LOCKED);

        let stored = state.db.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(
            stored.locked_until,
            Some(state.clock.timestamp() + LOCKOUT_SECS)
        );
    }

    #[tokio::test]
    async fn test_unknown_email_is_plain_401() {
        let state = test_state().await;
        let (status, body) = send(
            app(state),
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "password1"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["details"], BAD_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let state = test_state().await;
        let (status, _) = send(app(state.clone()), Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            send(app(state), Method::GET, "/api/auth/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_disabled_account_is_forbidden() {
        let state = test_state().await;
        let (user, token) = seed_user(&state, "ada").await;
        state.db.set_user_active(user.id, false).await.unwrap();

        let (status, _) = send(app(state), Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_change_password_history() {
        let state = test_state().await;
        let (_, token) = seed_user(&state, "ada").await;
        let change = |current: &'static str, new: &'static str| {
            let state = state.clone();
            let token = token.clone();
            async move {
                send(
                    app(state),
                    Method::POST,
                    "/api/auth/password",
                    Some(&token),
                    Some(json!({
                        "currentPassword": current,
                        "newPassword": new,
                        "confirmPassword": new
                    })),
                )
                .await
            }
        };

        let (status, _) = change("wrong-pass1", "password2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = change("password1", "password2").await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // Going back to the original is blocked by history.
        let (status, body) = change("password2", "password1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"].as_str().unwrap().contains("not used"));
    }

    #[tokio::test]
    async fn test_forgot_and_reset_flow() {
        let mailer = Arc::new(MemoryMailer::default());
        let state = test_state_with(None, mailer.clone()).await;
        seed_user(&state, "ada").await;

        let (status, _) = send(
            app(state.clone()),
            Method::POST,
            "/api/auth/password/forgot",
            None,
            Some(json!({"email": "nobody@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(mailer.last_url().is_none());

        let (status, _) = send(
            app(state.clone()),
            Method::POST,
            "/api/auth/password/forgot",
            None,
            Some(json!({"email": "ADA@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let url = mailer.last_url().expect("reset mail sent");
        assert!(url.starts_with("http://localhost:47900/reset-password?token="));
        let token = url.rsplit('=').next().unwrap().to_string();

        let reset = |new: &'static str| {
            let state = state.clone();
            let token = token.clone();
            async move {
                send(
                    app(state),
                    Method::POST,
                    "/api/auth/password/reset",
                    None,
                    Some(json!({"token": token, "newPassword": new, "confirmPassword": new})),
                )
                .await
            }
        };

        // Reusing the current password is refused and does not burn the token.
        let (status, _) = reset("password1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = reset("fresh-pass9").await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = reset("other-pass9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            app(state),
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "fresh-pass9"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_password_change_ends_older_sessions() {
        let state = test_state().await;
        let (user, token) = seed_user(&state, "ada").await;
        let later = state.clock.timestamp() + 10;
        let hash = hash_password("password2").await.unwrap();
        state.db.update_password(user.id, &hash, later).await.unwrap();

        let (status, body) =
            send(app(state.clone()), Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["details"].as_str().unwrap().contains("password change"));

        let fresh = issue_token(&state.keys, user.id, later, false).unwrap();
        let (status, _) = send(app(state), Method::GET, "/api/auth/me", Some(&fresh), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_password_hashing_does_not_block_runtime() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::time::Duration;

        let state = test_state().await;
        let (user, token) = seed_user(&state, "ada").await;
        for i in 2..=5 {
            let hash = hash_password(&format!("password{i}")).await.unwrap();
            state
                .db
                .update_password(user.id, &hash, state.clock.timestamp())
                .await
                .unwrap();
        }
        let current = hash_password("password1").await.unwrap();
        state
            .db
            .update_password(user.id, &current, state.clock.timestamp())
            .await
            .unwrap();

        let ticks = Arc::new(AtomicU32::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        let (status, body) = send(
            app(state),
            Method::POST,
            "/api/auth/password",
            Some(&token),
            Some(json!({
                "currentPassword": "password1",
                "newPassword": "password9",
                "confirmPassword": "password9"
            })),
        )
        .await;
        ticker.abort();

        assert_eq!(status, StatusCode::NO_CONTENT, "{body}");
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }
}
