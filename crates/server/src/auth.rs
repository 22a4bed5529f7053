// crates/server/src/auth.rs
//! Password hashing, session tokens and the `AuthUser` extractor.
//!
//! Passwords are stored as Argon2id PHC strings. Sessions are stateless
//! HS256 JWTs whose `sub` is the user id; every request re-loads the user
//! so deactivation takes effect immediately.

use std::sync::{Arc, OnceLock};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use worklog_db::User;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const SESSION_DAYS: i64 = 7;
pub const REMEMBER_DAYS: i64 = 30;

/// Consecutive failures before an account is locked.
pub const LOCKOUT_THRESHOLD: u32 = 5;
pub const LOCKOUT_SECS: i64 = 15 * 60;

pub const RESET_TOKEN_BYTES: usize = 32;
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn random() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Self::from_secret(&secret)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

fn hash_blocking(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// A malformed stored hash counts as a mismatch.
fn verify_blocking(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable password hash");
            false
        }
    }
}

/// Hash of a password nobody has, verified against when the account does
/// not exist so both login paths pay for one Argon2 run.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_blocking("worklog-no-such-account-1").unwrap_or_default())
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn on_blocking_pool<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("password worker failed: {e}")))
}

pub async fn hash_password(password: &str) -> ApiResult<String> {
    let password = password.to_owned();
    on_blocking_pool(move || hash_blocking(&password))
        .await?
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

pub async fn verify_password(password: &str, stored: &str) -> ApiResult<bool> {
    let (password, stored) = (password.to_owned(), stored.to_owned());
    on_blocking_pool(move || verify_blocking(&password, &stored)).await
}

/// True when `password` matches any of the given hashes.
pub async fn matches_any(password: &str, hashes: Vec<String>) -> ApiResult<bool> {
    let password = password.to_owned();
    on_blocking_pool(move || hashes.iter().any(|h| verify_blocking(&password, h))).await
}

/// Spend the same work as a real verify for an unknown account.
pub async fn verify_unknown_account(password: &str) -> ApiResult<()> {
    let password = password.to_owned();
    on_blocking_pool(move || {
        verify_blocking(&password, dummy_hash());
    })
    .await
}

pub fn issue_token(keys: &SessionKeys, user_id: i64, now: i64, remember: bool) -> ApiResult<String> {
    let days = if remember { REMEMBER_DAYS } else { SESSION_DAYS };
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + days * 24 * 60 * 60,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

/// What a valid session token says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub issued_at: i64,
}

/// Verify the signature, then check expiry against `now` rather than the
/// system clock.
pub fn verify_token(keys: &SessionKeys, token: &str, now: i64) -> ApiResult<Session> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<Claims>(token, &keys.decoding, &validation)
        .map_err(|e| ApiError::Unauthorized(format!("invalid session token: {e}")))?;
    if data.claims.exp <= now {
        return Err(ApiError::Unauthorized("session expired".to_string()));
    }
    let user_id = data
        .claims
        .sub
        .parse()
        .map_err(|_| ApiError::Unauthorized("invalid session subject".to_string()))?;
    Ok(Session {
        user_id,
        issued_at: data.claims.iat,
    })
}

/// Fresh reset token: `(raw, sha256 hex)`. Only the hash is persisted.
pub fn new_reset_token() -> (String, String) {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hashed = hash_reset_token(&raw);
    (raw, hashed)
}

pub fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// The signed-in, active user making the request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a Bearer token".to_string()))?;

        let session = verify_token(&state.keys, token.trim(), state.clock.timestamp())?;
        let user = state
            .db
            .find_user_by_id(session.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("account no longer exists".to_string()))?;
        // Tokens from the same second as the change stay valid.
        if session.issued_at < user.password_changed_at {
            return Err(ApiError::Unauthorized(
                "session ended by a password change".to_string(),
            ));
        }
        if !user.is_active {
            return Err(ApiError::Forbidden("account is disabled".to_string()));
        }
        Ok(AuthUser(user))
    }
}
