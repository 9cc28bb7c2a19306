//! Password hashing and session tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Session tokens are opaque
//! random identifiers handed out at login and presented as bearer tokens.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use uuid::Uuid;

/// Upper bound on session lifetime (ten years).
const MAX_SESSION_TTL_HOURS: u64 = 24 * 365 * 10;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Password hashing failed: {}", e))
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generate a new session token.
pub fn new_session_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Expiry time for a session issued now.
pub fn session_expiry(ttl_hours: u64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(ttl_hours.min(MAX_SESSION_TTL_HOURS) as i64)
}

/// Extract the token from an `Authorization` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
