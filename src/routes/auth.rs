use std::sync::Arc;

use actix_web::{
    cookie::Cookie,
    get,
    web::{self, Json},
    Error, HttpResponse, Responder,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::config::AppConfig;
use crate::google_auth;
use crate::middleware::auth::{AuthenticatedUser, SESSION_COOKIE};
use crate::types::UserProfile;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Deserialize)]
struct AuthCallbackQuery {
    code: Option<String>,
}

#[get("/url")]
async fn auth_url(app_state: web::Data<Arc<AppState>>) -> Result<impl Responder, Error> {
    let url = google_auth::authorization_url(&app_state.config);
    Ok(Json(json!({ "url": url })))
}

#[get("/callback")]
async fn auth_callback(
    app_state: web::Data<Arc<AppState>>,
    info: web::Query<AuthCallbackQuery>,
) -> Result<HttpResponse, Error> {
    let Some(code) = &info.code else {
        return Ok(HttpResponse::BadRequest()
            .json(json!({ "message": "Código de autorização ausente" })));
    };

    match google_auth::exchange_code_for_user(app_state.get_ref(), code).await {
        Ok(user) => {
            let token = sign_session_token(user.id, &app_state.config).map_err(|e| {
                error!("Failed to sign session token: {:?}", e);
                actix_web::error::ErrorInternalServerError(e.to_string())
            })?;

            Ok(HttpResponse::Found()
                .insert_header(("Location", "/"))
                .cookie(
                    Cookie::build(SESSION_COOKIE, token)
                        .path("/")
                        .http_only(true)
                        .finish(),
                )
                .finish())
        }
        Err(e) => {
            error!("Authentication failed: {:?}", e);
            Ok(HttpResponse::Unauthorized().json(json!({ "message": "Falha na autenticação" })))
        }
    }
}

#[get("/status")]
async fn auth_status(user: Option<AuthenticatedUser>) -> Result<impl Responder, Error> {
    match user {
        Some(user) => Ok(Json(
            json!({ "authenticated": true, "userId": user.user_id }),
        )),
        None => Ok(Json(json!({ "authenticated": false }))),
    }
}

#[get("/logout")]
async fn logout() -> Result<HttpResponse, Error> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "success": true })))
}

#[get("/user")]
async fn get_user(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<HttpResponse, Error> {
    match app_state.store.get_user(authenticated_user.user_id) {
        Some(user) => Ok(HttpResponse::Ok().json(UserProfile::from(&user))),
        None => Ok(HttpResponse::NotFound().json(json!({ "message": "Usuário não encontrado" }))),
    }
}

/// Signs the session token carried by the cookie. Expires after a week.
pub fn sign_session_token(
    user_id: i64,
    config: &AppConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600 * 24 * 7,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
}
