use std::{
    future::{ready, Ready},
    sync::Arc,
};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::{debug, warn};

use crate::{config::AppConfig, routes::auth::Claims};

pub const SESSION_COOKIE: &str = "session_token";

/// Identity of the caller, inserted by the middleware when the session
/// token validates. Extracting it on a handler makes that route require
/// authentication.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .copied()
                .ok_or_else(|| ErrorUnauthorized("Não autenticado")),
        )
    }
}

pub struct Authentication {
    pub app_config: Arc<AppConfig>,
}

// Middleware factory is `Transform` trait
// `S` - type of the next service
// `B` - type of response's body
impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service,
            app_config: self.app_config.clone(),
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: S,
    app_config: Arc<AppConfig>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // The session token travels in a cookie; a bearer header works too.
        let token = req
            .request()
            .cookie(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .or_else(|| {
                req.headers()
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .filter(|value| value.starts_with("Bearer "))
                    .map(|value| value["Bearer ".len()..].to_string())
            });

        if let Some(token) = token {
            let decoding_key = DecodingKey::from_secret(self.app_config.jwt_secret.as_ref());

            match decode::<Claims>(&token, &decoding_key, &Validation::default()) {
                Ok(token_data) => match token_data.claims.sub.parse::<i64>() {
                    Ok(user_id) => {
                        debug!("Authenticated user: {}", user_id);
                        req.extensions_mut().insert(AuthenticatedUser { user_id });
                    }
                    Err(_) => warn!("Session token subject is not a user id"),
                },
                Err(e) => {
                    warn!("Invalid session token: {:?}", e);
                }
            }
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            Ok(res)
        })
    }
}
