use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::User;

/// User record as exposed to the client: no password, no Google tokens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub google_id: Option<String>,
    pub google_token_expiry: Option<DateTime<Utc>>,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            google_id: user.google_id.clone(),
            google_token_expiry: user.google_token_expiry,
            picture: user.picture.clone(),
            created_at: user.created_at,
        }
    }
}
