pub mod auth;
pub mod health;
pub mod users;

use jwt_security::token_fingerprint;

use crate::app_state::AppState;

/// Revoke the token the caller presented; failures are logged, not returned
pub(crate) async fn revoke_presented(state: &AppState, token: &str) -> bool {
    match state.sessions.invalidate(token).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(
                token = %token_fingerprint(token),
                error = %e,
                "Failed to revoke presented token"
            );
            false
        }
    }
}
