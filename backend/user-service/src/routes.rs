use actix_middleware::JwtAuthMiddleware;
use actix_web::web;
use jwt_security::TokenAuthenticator;
use std::sync::Arc;

use crate::error::{AppError, INVALID_REQUEST};
use crate::handlers::{auth, health, users};

/// Malformed JSON bodies get the envelope instead of actix's plain-text 400
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected request body");
        AppError::BadRequest(INVALID_REQUEST.to_string()).into()
    })
}

/// Register every route; `/user`, `/password` and `/logout` sit behind the gate
pub fn configure(cfg: &mut web::ServiceConfig, authenticator: Arc<dyn TokenAuthenticator>) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(health::metrics))
        .route("/register", web::post().to(auth::register))
        .route("/login", web::post().to(auth::login))
        .service(
            web::resource("/user")
                .wrap(JwtAuthMiddleware::new(authenticator.clone()))
                .route(web::get().to(users::get_user))
                .route(web::put().to(users::update_user)),
        )
        .service(
            web::resource("/password")
                .wrap(JwtAuthMiddleware::new(authenticator.clone()))
                .route(web::put().to(users::change_password)),
        )
        .service(
            web::resource("/logout")
                .wrap(JwtAuthMiddleware::new(authenticator))
                .route(web::post().to(auth::logout)),
        )
        .default_service(web::to(health::not_found));
}
