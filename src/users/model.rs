//! Principal records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user.
///
/// The password hash never leaves the server: it is skipped when a
/// principal is serialized into a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Build a fresh, active principal.
    pub fn new(email: &str, password_hash: String, full_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            full_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied by the administration endpoint.
///
/// `password` is plain text here; it is hashed before it reaches the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrincipalUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

impl PrincipalUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.full_name.is_none()
            && self.password.is_none()
            && self.is_active.is_none()
    }
}

/// Fields the store writes for an update (password already hashed).
#[derive(Debug, Clone, Default)]
pub struct StoredUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
}
