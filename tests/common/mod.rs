#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use httpmock::MockServer;

use tempo::config::AppConfig;
use tempo::models::{NewUser, User};
use tempo::routes::auth::sign_session_token;
use tempo::AppState;

pub fn test_config(server: &MockServer) -> AppConfig {
    AppConfig {
        google_client_id: "client-id".to_string(),
        google_client_secret: "client-secret".to_string(),
        google_redirect_uri: "http://localhost:3000/api/auth/callback".to_string(),
        openai_api_key: "test-key".to_string(),
        openai_api_base: Some(server.base_url()),
        jwt_secret: "test-secret".to_string(),
        google_auth_base: server.base_url(),
        google_token_base: server.base_url(),
        google_api_base: server.base_url(),
        calendar_timezone: chrono_tz::America::Sao_Paulo,
        port: 0,
    }
}

pub fn test_state(server: &MockServer) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(server)))
}

/// A user whose Google access token expires at `expiry`.
pub fn seed_user(state: &AppState, email: &str, expiry: DateTime<Utc>) -> User {
    state.store.create_user(NewUser {
        username: "ana".to_string(),
        email: email.to_string(),
        password: None,
        google_id: Some("google-1".to_string()),
        google_refresh_token: Some("refresh-token".to_string()),
        google_access_token: Some("access-token".to_string()),
        google_token_expiry: Some(expiry),
        picture: None,
    })
}

/// Cookie header value carrying a signed session token for `user_id`.
pub fn session_cookie(state: &AppState, user_id: i64) -> String {
    let token = sign_session_token(user_id, &state.config).expect("sign session token");
    format!("session_token={}", token)
}
