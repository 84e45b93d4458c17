// 👤 User Entity
// Owner of every other record; all queries are scoped by user id

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
///
/// The password digest and salt never leave the backend: they are skipped
/// during serialization so handlers can return a `User` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable identity (UUID) - never changes
    pub id: String,

    /// Login email, unique across users
    pub email: String,

    /// Display name shown in the UI
    pub display_name: String,

    /// Salted SHA-256 digest of the password
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password_hash: String,

    /// Per-user random salt
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password_salt: String,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, display_name: String, password_hash: String, password_salt: String) -> Self {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            display_name,
            password_hash,
            password_salt,
            created_at: Utc::now(),
        }
    }
}
