use actix_middleware::AuthenticatedUser;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::revoke_presented;
use crate::app_state::AppState;
use crate::error::{AppError, Result, INVALID_REQUEST};
use crate::models::UserProfile;
use crate::response;
use crate::security::{hash_password, verify_password};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateTarget {
    Username,
    Nickname,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub target: UpdateTarget,

    #[validate(length(min = 1, message = "Invalid request data"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Invalid request data"))]
    pub old_password: String,

    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    pub new_password: String,
}

/// GET /user
pub async fn get_user(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let account = state
        .users
        .find_by_username(&user.username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(response::success(UserProfile::from(&account)))
}

/// PUT /user
///
/// The presented token is revoked before anything else, since the identity
/// it names is about to change.
pub async fn update_user(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: std::result::Result<web::Json<UpdateUserRequest>, actix_web::Error>,
) -> Result<HttpResponse> {
    revoke_presented(&state, &user.token).await;

    let req = body
        .map_err(|_| AppError::BadRequest(INVALID_REQUEST.to_string()))?
        .into_inner();
    req.validate()?;

    match req.target {
        UpdateTarget::Username => {
            if state.users.find_by_username(&req.content).await?.is_some() {
                return Err(AppError::BadRequest("Username already exists".to_string()));
            }
            state
                .users
                .update_username(&user.username, &req.content)
                .await?;
            tracing::info!(from = %user.username, to = %req.content, "Username changed");
        }
        UpdateTarget::Nickname => {
            state
                .users
                .update_nickname(&user.username, &req.content)
                .await?;
        }
    }

    Ok(response::success(json!({
        "message": "User updated successfully",
    })))
}

/// PUT /password
pub async fn change_password(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: std::result::Result<web::Json<ChangePasswordRequest>, actix_web::Error>,
) -> Result<HttpResponse> {
    revoke_presented(&state, &user.token).await;

    let req = body
        .map_err(|_| AppError::BadRequest(INVALID_REQUEST.to_string()))?
        .into_inner();
    req.validate()?;

    let account = state
        .users
        .find_by_username(&user.username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let old_password = req.old_password;
    let stored_hash = account.password_hash;
    let valid = web::block(move || verify_password(&old_password, &stored_hash)).await??;
    if !valid {
        return Err(AppError::BadRequest("Old password is incorrect".to_string()));
    }

    let new_password = req.new_password;
    let new_hash = web::block(move || hash_password(&new_password)).await??;
    state
        .users
        .update_password(&user.username, &new_hash)
        .await?;

    tracing::info!(username = %user.username, "Password changed");

    Ok(response::success(json!({
        "message": "Password updated successfully",
    })))
}
