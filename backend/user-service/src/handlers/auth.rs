use actix_middleware::AuthenticatedUser;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use super::revoke_presented;
use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::models::{NewUser, UserProfile};
use crate::response;
use crate::security::{hash_password, verify_password};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    pub username: String,

    pub nickname: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username and password are required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Username and password are required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub nickname: String,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
    pub message: &'static str,
}

/// POST /register
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    let req = body.into_inner();

    if req.username.is_empty() || req.nickname.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username, nickname and password are required".to_string(),
        ));
    }
    req.validate()?;

    if state.users.find_by_username(&req.username).await?.is_some() {
        return Err(AppError::BadRequest("Username already exists".to_string()));
    }

    let password = req.password;
    let password_hash = web::block(move || hash_password(&password)).await??;

    let user = state
        .users
        .insert(NewUser {
            username: req.username,
            nickname: req.nickname,
            password_hash,
        })
        .await?;

    tracing::info!(username = %user.username, "User registered");

    Ok(response::success(RegisterResponse {
        username: user.username,
        nickname: user.nickname,
        message: "User registered successfully",
    }))
}

/// POST /login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let req = body.into_inner();
    req.validate()?;

    let user = state
        .users
        .find_by_username(&req.username)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let password = req.password;
    let stored_hash = user.password_hash.clone();
    let valid = web::block(move || verify_password(&password, &stored_hash)).await??;
    if !valid {
        tracing::debug!(username = %user.username, "Login rejected: wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let token = state.sessions.issue(&user.username).map_err(|e| {
        tracing::error!(error = %e, "Failed to issue session token");
        AppError::Internal("Failed to generate token".to_string())
    })?;

    tracing::info!(username = %user.username, "User logged in");

    Ok(response::success(LoginResponse {
        token,
        user: UserProfile::from(&user),
        message: "Login succeed",
    }))
}

/// POST /logout
///
/// Always succeeds; a failed ledger write only adds a warning.
pub async fn logout(state: web::Data<AppState>, user: AuthenticatedUser) -> HttpResponse {
    if revoke_presented(&state, &user.token).await {
        tracing::info!(username = %user.username, "User logged out");
        response::success(json!({
            "message": "Logout succeed, token has been invalidated",
        }))
    } else {
        response::success(json!({
            "message": "Logout succeed",
            "warning": "Token may still be valid for a short time",
        }))
    }
}
