use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use urlencoding::encode;

use crate::config::AppConfig;
use crate::models::{NewUser, User};
use crate::store::StoreError;
use crate::AppState;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Calendar read/write plus enough profile access to identify the user.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/calendar",
];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("provider rejected the authorization code")]
    CodeRejected(#[source] anyhow::Error),
    #[error("token response did not include an access token")]
    MissingAccessToken,
    #[error("could not fetch the authenticated user's profile")]
    ProfileUnavailable(#[source] anyhow::Error),
    #[error("profile response did not include an email")]
    MissingEmail,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("user {0} not found")]
    UnknownUser(i64),
    #[error("user has not connected a Google account")]
    NotConnected,
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("token refresh failed")]
    RefreshFailed(#[source] anyhow::Error),
    #[error("refresh response did not include an access token")]
    MissingAccessToken,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Authorization URL for the consent screen. Offline access plus a forced
/// consent prompt so a refresh token is issued even on repeat logins.
pub fn authorization_url(config: &AppConfig) -> String {
    format!(
        "{}/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        config.google_auth_base,
        encode(&config.google_client_id),
        encode(&config.google_redirect_uri),
        encode(&SCOPES.join(" ")),
    )
}

/// Exchanges an authorization code for tokens, resolves the profile behind
/// them, and creates or updates the local user record keyed by email.
pub async fn exchange_code_for_user(state: &AppState, code: &str) -> Result<User, AuthError> {
    let tokens = request_tokens(
        state,
        &[
            ("code", code),
            ("client_id", &state.config.google_client_id),
            ("client_secret", &state.config.google_client_secret),
            ("redirect_uri", &state.config.google_redirect_uri),
            ("grant_type", "authorization_code"),
        ],
    )
    .await
    .map_err(AuthError::CodeRejected)?;

    let access_token = tokens.access_token.ok_or(AuthError::MissingAccessToken)?;
    let expiry = tokens
        .expires_in
        .map(|seconds| Utc::now() + Duration::seconds(seconds));

    let profile = fetch_user_info(state, &access_token)
        .await
        .map_err(AuthError::ProfileUnavailable)?;
    let email = profile.email.ok_or(AuthError::MissingEmail)?;

    if let Some(existing) = state.store.get_user_by_email(&email) {
        let user = state.store.update_user_tokens(
            existing.id,
            &access_token,
            tokens.refresh_token,
            expiry,
        )?;
        info!("Updated tokens for user {}", user.id);
        return Ok(user);
    }

    let username = profile
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    let user = state.store.create_user(NewUser {
        username,
        email,
        password: None,
        google_id: profile.id,
        google_refresh_token: tokens.refresh_token,
        google_access_token: Some(access_token),
        google_token_expiry: expiry,
        picture: profile.picture,
    });
    info!("Created user {} on first login", user.id);
    Ok(user)
}

/// Returns a usable access token for the user, refreshing it first when the
/// stored one has expired. Consumers must treat any error as "calendar
/// access unavailable", not as a crash.
pub async fn valid_access_token(state: &AppState, user_id: i64) -> Result<String, TokenError> {
    let user = state
        .store
        .get_user(user_id)
        .ok_or(TokenError::UnknownUser(user_id))?;

    let access_token = user
        .google_access_token
        .clone()
        .ok_or(TokenError::NotConnected)?;

    let expired = user
        .google_token_expiry
        .map(|expiry| Utc::now() >= expiry)
        .unwrap_or(false);

    if !expired {
        return Ok(access_token);
    }

    let refresh_token = user
        .google_refresh_token
        .clone()
        .ok_or(TokenError::NoRefreshToken)?;

    let tokens = request_tokens(
        state,
        &[
            ("client_id", &state.config.google_client_id),
            ("client_secret", &state.config.google_client_secret),
            ("refresh_token", &refresh_token),
            ("grant_type", "refresh_token"),
        ],
    )
    .await
    .map_err(TokenError::RefreshFailed)?;

    let new_access_token = tokens.access_token.ok_or(TokenError::MissingAccessToken)?;
    let expiry = tokens
        .expires_in
        .map(|seconds| Utc::now() + Duration::seconds(seconds));

    state
        .store
        .update_user_tokens(user.id, &new_access_token, tokens.refresh_token, expiry)?;

    Ok(new_access_token)
}

async fn request_tokens(
    state: &AppState,
    params: &[(&str, &str)],
) -> Result<TokenResponse, anyhow::Error> {
    let response = state
        .http_client
        .post(format!("{}/token", state.config.google_token_base))
        .timeout(REQUEST_TIMEOUT)
        .form(params)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());
        error!("Token endpoint returned {}: {}", status, error_body);
        return Err(anyhow!("token endpoint returned {}", status));
    }

    Ok(response.json::<TokenResponse>().await?)
}

async fn fetch_user_info(
    state: &AppState,
    access_token: &str,
) -> Result<GoogleUserInfo, anyhow::Error> {
    let response = state
        .http_client
        .get(format!(
            "{}/oauth2/v2/userinfo",
            state.config.google_api_base
        ))
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(access_token)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());
        error!("Userinfo endpoint returned {}: {}", status, error_body);
        return Err(anyhow!("userinfo endpoint returned {}", status));
    }

    Ok(response.json::<GoogleUserInfo>().await?)
}
