//! Bearer-token request gate
//!
//! `JwtAuthMiddleware` rejects a request with 401 before it reaches the
//! handler unless it carries `Authorization: Bearer <token>` and the token
//! passes the [`TokenAuthenticator`]. On success an [`AuthenticatedUser`] is
//! stored in the request extensions.
//!
//! `OptionalJwtAuthMiddleware` does the same extraction but lets every request
//! through, attaching the identity only when authentication succeeds.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, header::HeaderMap, StatusCode},
    Error, HttpMessage, HttpResponse, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use jwt_security::{token_fingerprint, AuthFailureKind, Claims, TokenAuthenticator};
use std::rc::Rc;
use std::sync::Arc;

use crate::metrics::record_auth_decision;

/// Identity attached to an authenticated request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
    /// Token exactly as presented, needed to revoke it on logout
    pub token: String,
    pub claims: Claims,
}

/// Why the gate refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("Authorization header is required")]
    MissingCredential,

    #[error("Authorization header format must be 'Bearer {{token}}'")]
    MalformedCredential,

    #[error("{}", .0.public_reason())]
    Unauthenticated(AuthFailureKind),
}

impl GateRejection {
    /// Metric label for this decision
    pub fn outcome(&self) -> &'static str {
        match self {
            GateRejection::MissingCredential => "missing_credential",
            GateRejection::MalformedCredential => "malformed_credential",
            GateRejection::Unauthenticated(kind) => kind.as_str(),
        }
    }
}

impl ResponseError for GateRejection {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "code": self.status_code().as_u16(),
            "message": self.to_string(),
            "data": null,
        }))
    }
}

/// Token from a `Bearer <token>` header value
///
/// The value must split on single spaces into exactly two parts, the first
/// being literally `Bearer`. An empty second part is still well formed; the
/// authenticator rejects it as empty input.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, GateRejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(GateRejection::MissingCredential)?;

    let value = value
        .to_str()
        .map_err(|_| GateRejection::MalformedCredential)?;
    if value.is_empty() {
        return Err(GateRejection::MissingCredential);
    }

    parse_bearer(value)
        .map(str::to_owned)
        .ok_or(GateRejection::MalformedCredential)
}

async fn authenticate_request(
    headers: &HeaderMap,
    authenticator: &dyn TokenAuthenticator,
) -> Result<AuthenticatedUser, GateRejection> {
    let token = bearer_token(headers)?;

    let claims = authenticator
        .authenticate(&token)
        .await
        .map_err(|e| GateRejection::Unauthenticated(e.kind()))?;

    Ok(AuthenticatedUser {
        username: claims.username.clone(),
        token,
        claims,
    })
}

/// JWT Authentication Middleware
#[derive(Clone)]
pub struct JwtAuthMiddleware {
    authenticator: Arc<dyn TokenAuthenticator>,
}

impl JwtAuthMiddleware {
    pub fn new(authenticator: Arc<dyn TokenAuthenticator>) -> Self {
        Self { authenticator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            authenticator: self.authenticator.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    authenticator: Arc<dyn TokenAuthenticator>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let authenticator = self.authenticator.clone();

        Box::pin(async move {
            let outcome = authenticate_request(req.headers(), authenticator.as_ref()).await;
            match outcome {
                Ok(user) => {
                    record_auth_decision("authenticated");
                    tracing::debug!(
                        username = %user.username,
                        token = %token_fingerprint(&user.token),
                        "Request authenticated"
                    );
                    req.extensions_mut().insert(user);
                    service.call(req).await.map(|res| res.map_into_left_body())
                }
                Err(rejection) => {
                    record_auth_decision(rejection.outcome());
                    tracing::warn!(
                        path = %req.path(),
                        outcome = rejection.outcome(),
                        "Request rejected by auth gate"
                    );
                    let response = rejection.error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

/// Attaches identity when possible, never rejects
#[derive(Clone)]
pub struct OptionalJwtAuthMiddleware {
    authenticator: Arc<dyn TokenAuthenticator>,
}

impl OptionalJwtAuthMiddleware {
    pub fn new(authenticator: Arc<dyn TokenAuthenticator>) -> Self {
        Self { authenticator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OptionalJwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = OptionalJwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(OptionalJwtAuthMiddlewareService {
            service: Rc::new(service),
            authenticator: self.authenticator.clone(),
        }))
    }
}

pub struct OptionalJwtAuthMiddlewareService<S> {
    service: Rc<S>,
    authenticator: Arc<dyn TokenAuthenticator>,
}

impl<S, B> Service<ServiceRequest> for OptionalJwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let authenticator = self.authenticator.clone();

        Box::pin(async move {
            let outcome = authenticate_request(req.headers(), authenticator.as_ref()).await;
            match outcome {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                }
                Err(rejection) => {
                    tracing::debug!(
                        outcome = rejection.outcome(),
                        "Continuing without identity"
                    );
                }
            }
            service.call(req).await
        })
    }
}

/// FromRequest implementation for AuthenticatedUser
impl actix_web::FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(GateRejection::MissingCredential.into())),
        }
    }
}
