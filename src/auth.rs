// 🔑 Auth Plumbing - salted password digests and session tokens
// Deliberately thin: enough for the API's bearer-token ownership checks,
// nothing more. Tokens are random UUIDs stored in the sessions table.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::db;
use crate::models::User;

/// Sessions live for 30 days
pub const SESSION_DAYS: i64 = 30;

/// Salted SHA-256 digest of a password
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn new_salt() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn verify_password(user: &User, password: &str) -> bool {
    hash_password(password, &user.password_salt) == user.password_hash
}

/// Issued session token plus its expiry
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Create a session row and return the bearer token
pub fn issue_session(conn: &Connection, user_id: &str) -> Result<SessionToken> {
    let token = uuid::Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    db::create_session(conn, &token, user_id, expires_at)?;
    Ok(SessionToken { token, expires_at })
}

/// Register a new user (validation happens before this point)
pub fn register_user(conn: &Connection, email: &str, password: &str, display_name: &str) -> Result<User> {
    let salt = new_salt();
    let user = User::new(
        email.trim().to_lowercase(),
        display_name.trim().to_string(),
        hash_password(password, &salt),
        salt,
    );
    db::create_user(conn, &user)?;
    Ok(user)
}

/// Check credentials; None means unknown email or wrong password
pub fn login(conn: &Connection, email: &str, password: &str) -> Result<Option<User>> {
    let user = db::get_user_by_email(conn, &email.trim().to_lowercase())?;
    Ok(user.filter(|u| verify_password(u, password)))
}
