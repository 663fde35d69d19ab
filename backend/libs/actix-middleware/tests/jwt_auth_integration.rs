use actix_middleware::{AuthenticatedUser, JwtAuthMiddleware, OptionalJwtAuthMiddleware};
use actix_web::{test, web, App, HttpResponse};
use async_trait::async_trait;
use jwt_security::test_utils::{FailingStore, TestStack};
use jwt_security::{AuthError, Claims, TokenAuthenticator, TokenError};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn whoami(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "username": user.username }))
}

async fn maybe_whoami(user: Option<AuthenticatedUser>) -> HttpResponse {
    let username = user.map(|u| u.username);
    HttpResponse::Ok().json(serde_json::json!({ "username": username }))
}

/// Authenticator that records how often it is consulted
struct CountingAuthenticator {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenAuthenticator for CountingAuthenticator {
    async fn authenticate(&self, _token: &str) -> Result<Claims, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::Token(TokenError::Malformed))
    }
}

macro_rules! gated_app {
    ($authenticator:expr) => {
        test::init_service(
            App::new()
                .wrap(JwtAuthMiddleware::new($authenticator))
                .route("/user", web::get().to(whoami)),
        )
        .await
    };
}

/// GET /user with an optional Authorization header, returning (status, body)
macro_rules! get_user {
    ($app:expr, $authorization:expr) => {{
        let mut req = test::TestRequest::get().uri("/user");
        let authorization: Option<&str> = $authorization;
        if let Some(value) = authorization {
            req = req.insert_header(("Authorization", value));
        }
        let resp = test::call_service($app, req.to_request()).await;
        let status = resp.status().as_u16();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

#[actix_web::test]
async fn valid_token_reaches_handler() {
    let stack = TestStack::new();
    let token = stack.authenticator.issue("alice").unwrap();
    let app = gated_app!(stack.authenticator.clone());

    let header = format!("Bearer {}", token);
    let (status, body) = get_user!(&app, Some(header.as_str()));
    assert_eq!(status, 200);
    assert_eq!(body["username"], "alice");
}

#[actix_web::test]
async fn missing_header_rejected() {
    let stack = TestStack::new();
    let app = gated_app!(stack.authenticator.clone());

    let (status, body) = get_user!(&app, None);
    assert_eq!(status, 401);
    assert_eq!(body["code"], 401);
    assert_eq!(body["message"], "Authorization header is required");
    assert!(body["data"].is_null());
}

#[actix_web::test]
async fn basic_scheme_rejected_without_authenticating() {
    let counter = Arc::new(CountingAuthenticator {
        calls: AtomicUsize::new(0),
    });
    let app = gated_app!(counter.clone());

    let (status, body) = get_user!(&app, Some("Basic abc123"));
    assert_eq!(status, 401);
    assert_eq!(
        body["message"],
        "Authorization header format must be 'Bearer {token}'"
    );
    assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

    // A well-formed header does reach the authenticator
    let (status, _) = get_user!(&app, Some("Bearer abc"));
    assert_eq!(status, 401);
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn empty_bearer_token_fails_authentication() {
    let stack = TestStack::new();
    let app = gated_app!(stack.authenticator.clone());

    let (status, body) = get_user!(&app, Some("Bearer "));
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Authentication failed");
    assert!(body["data"].is_null());
}

#[actix_web::test]
async fn revoked_token_reads_as_invalid() {
    let stack = TestStack::new();
    let token = stack.authenticator.issue("alice").unwrap();
    stack.authenticator.invalidate(&token).await.unwrap();
    let app = gated_app!(stack.authenticator.clone());

    let header = format!("Bearer {}", token);
    let (status, body) = get_user!(&app, Some(header.as_str()));
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Invalid token");
}

#[actix_web::test]
async fn expired_token_reports_expiry() {
    let stack = TestStack::new();
    let token = stack.authenticator.issue("alice").unwrap();
    stack.clock.advance(chrono::Duration::hours(25));
    let app = gated_app!(stack.authenticator.clone());

    let header = format!("Bearer {}", token);
    let (status, body) = get_user!(&app, Some(header.as_str()));
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Token has expired");
}

#[actix_web::test]
async fn unreachable_ledger_fails_closed() {
    let stack = TestStack::with_store(Arc::new(FailingStore::timeout()));
    let token = stack.codec.issue("alice").unwrap();
    let app = gated_app!(stack.authenticator.clone());

    let header = format!("Bearer {}", token);
    let (status, body) = get_user!(&app, Some(header.as_str()));
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Authentication failed");
}

#[actix_web::test]
async fn optional_gate_never_rejects() {
    let stack = TestStack::new();
    let token = stack.authenticator.issue("alice").unwrap();
    let app = test::init_service(
        App::new()
            .wrap(OptionalJwtAuthMiddleware::new(stack.authenticator.clone()))
            .route("/user", web::get().to(maybe_whoami)),
    )
    .await;

    let header = format!("Bearer {}", token);
    let (status, body) = get_user!(&app, Some(header.as_str()));
    assert_eq!(status, 200);
    assert_eq!(body["username"], "alice");

    for header in [None, Some("Basic abc123"), Some("Bearer not-a-jwt")] {
        let (status, body) = get_user!(&app, header);
        assert_eq!(status, 200);
        assert!(body["username"].is_null());
    }
}

#[actix_web::test]
async fn extractor_without_gate_is_unauthorized() {
    let app = test::init_service(App::new().route("/user", web::get().to(whoami))).await;

    let (status, body) = get_user!(&app, None);
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Authorization header is required");
}
