use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use chrono::{Duration, Utc};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::{json, Value};

use tempo::google_auth::{self, TokenError};
use tempo::middleware::auth::Authentication;
use tempo::routes;

mod common;

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(Authentication {
                    app_config: Arc::new($state.config.clone()),
                })
                .configure(routes::configure($state.clone())),
        )
        .await
    };
}

#[actix_web::test]
async fn auth_url_requests_calendar_scopes_offline() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let app = init_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/auth/url").to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    let url = body["url"].as_str().unwrap();
    assert!(url.contains("access_type=offline"));
    assert!(url.contains("prompt=consent"));
    assert!(url.contains("calendar"));
}

#[actix_web::test]
async fn callback_without_code_is_rejected() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let app = init_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/callback")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn repeated_logins_for_one_email_share_one_user_record() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let app = init_app!(state);

    let mut token_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3600,
                "token_type": "Bearer"
            }));
        })
        .await;
    let userinfo_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/oauth2/v2/userinfo");
            then.status(200).json_body(json!({
                "id": "google-1",
                "email": "ana@example.com",
                "name": "Ana",
                "picture": "https://example.com/ana.png"
            }));
        })
        .await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/callback?code=first-code")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let session = resp
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session_token");
    assert!(session.is_some());

    let user = state.store.get_user_by_email("ana@example.com").unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(user.google_access_token.as_deref(), Some("access-1"));
    assert_eq!(user.google_refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(user.username, "Ana");

    // Second login: a new access token but no refresh token, which must be
    // kept from the first consent.
    token_mock.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({
                "access_token": "access-2",
                "expires_in": 3600,
                "token_type": "Bearer"
            }));
        })
        .await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/callback?code=second-code")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let user = state.store.get_user_by_email("ana@example.com").unwrap();
    assert_eq!(user.id, 1);
    assert!(state.store.get_user(2).is_none());
    assert_eq!(user.google_access_token.as_deref(), Some("access-2"));
    assert_eq!(user.google_refresh_token.as_deref(), Some("refresh-1"));

    userinfo_mock.assert_hits_async(2).await;
}

#[actix_web::test]
async fn failed_exchange_answers_unauthorized() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let app = init_app!(state);

    server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(400).json_body(json!({"error": "invalid_grant"}));
        })
        .await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/callback?code=bad-code")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn status_reflects_the_session() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let user = common::seed_user(&state, "ana@example.com", Utc::now() + Duration::hours(1));
    let app = init_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/auth/status").to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["authenticated"], json!(false));
    assert!(body.get("userId").is_none());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/status")
            .insert_header(("Cookie", common::session_cookie(&state, user.id)))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["authenticated"], json!(true));
    assert_eq!(body["userId"], json!(user.id));
}

#[actix_web::test]
async fn logout_clears_the_session_cookie() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let app = init_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/auth/logout").to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let removal = resp
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session_token")
        .unwrap();
    assert_eq!(removal.value(), "");

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
}

#[actix_web::test]
async fn user_profile_requires_a_session_and_hides_secrets() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let user = common::seed_user(&state, "ana@example.com", Utc::now() + Duration::hours(1));
    let app = init_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/auth/user").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/user")
            .insert_header(("Cookie", common::session_cookie(&state, user.id)))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["email"], json!("ana@example.com"));
    assert!(body.get("googleAccessToken").is_none());
    assert!(body.get("googleRefreshToken").is_none());
    assert!(body.get("password").is_none());
}

#[actix_web::test]
async fn unknown_session_user_is_not_found() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let app = init_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/user")
            .insert_header(("Cookie", common::session_cookie(&state, 42)))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn cached_access_token_is_reused_before_expiry() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let user = common::seed_user(&state, "ana@example.com", Utc::now() + Duration::hours(1));

    let token = google_auth::valid_access_token(&state, user.id).await.unwrap();
    assert_eq!(token, "access-token");
}

#[actix_web::test]
async fn expired_access_token_is_refreshed_and_persisted() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let user = common::seed_user(&state, "ana@example.com", Utc::now() - Duration::minutes(5));

    let refresh_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({
                "access_token": "access-2",
                "expires_in": 3600,
                "token_type": "Bearer"
            }));
        })
        .await;

    let token = google_auth::valid_access_token(&state, user.id).await.unwrap();
    assert_eq!(token, "access-2");
    refresh_mock.assert_hits_async(1).await;

    let stored = state.store.get_user(user.id).unwrap();
    assert_eq!(stored.google_access_token.as_deref(), Some("access-2"));
    assert_eq!(stored.google_refresh_token.as_deref(), Some("refresh-token"));
    assert!(stored.google_token_expiry.unwrap() > Utc::now());

    // The fresh token is served from the cache afterwards.
    let token = google_auth::valid_access_token(&state, user.id).await.unwrap();
    assert_eq!(token, "access-2");
    refresh_mock.assert_hits_async(1).await;
}

#[actix_web::test]
async fn missing_refresh_token_is_a_typed_absence() {
    let server = MockServer::start_async().await;
    let state = common::test_state(&server);
    let bare = state.store.create_user(tempo::models::NewUser {
        username: "bia".to_string(),
        email: "bia@example.com".to_string(),
        password: None,
        google_id: None,
        google_refresh_token: None,
        google_access_token: Some("stale".to_string()),
        google_token_expiry: Some(Utc::now() - Duration::minutes(5)),
        picture: None,
    });

    let result = google_auth::valid_access_token(&state, bare.id).await;
    assert!(matches!(result, Err(TokenError::NoRefreshToken)));
}
