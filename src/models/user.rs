use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An account in this system is just an email plus a display name; the email
/// doubles as the user id everywhere (collaborators, assignments, presence).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn new(email: String, name: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            email: email.trim().to_lowercase(),
            name,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
