use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: Option<String>,
    pub google_id: Option<String>,
    pub google_refresh_token: Option<String>,
    pub google_access_token: Option<String>,
    pub google_token_expiry: Option<DateTime<Utc>>,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when a user record is first created; the store assigns
/// the id and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: Option<String>,
    pub google_id: Option<String>,
    pub google_refresh_token: Option<String>,
    pub google_access_token: Option<String>,
    pub google_token_expiry: Option<DateTime<Utc>>,
    pub picture: Option<String>,
}
