//! # Actix Middleware Library
//!
//! Shared middleware for the account service
//!
//! ## Modules
//! - `jwt_auth`: Bearer-token request gate (required and optional variants)
//! - `metrics`: Prometheus request and auth-decision metrics

pub mod jwt_auth;
pub mod metrics;

pub use jwt_auth::{
    parse_bearer, AuthenticatedUser, GateRejection, JwtAuthMiddleware, OptionalJwtAuthMiddleware,
};
pub use metrics::MetricsMiddleware;
