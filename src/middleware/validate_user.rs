use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::app::AppState;
use crate::database::models::User;
use crate::error::ApiError;

/// The full user record behind the token, loaded fresh for each request
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Re-load the token's user and reject tokens whose user was deleted, deactivated,
/// or had their role or email changed since the token was issued.
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let user = state.users().select_by_id(auth_user.user_id).await?.ok_or_else(|| {
        tracing::warn!("User validation failed: user {} no longer exists", auth_user.user_id);
        ApiError::unauthorized("User no longer exists")
    })?;

    if !user.is_active {
        tracing::warn!("User validation failed: user '{}' is inactive", user.email);
        return Err(ApiError::forbidden("User account is inactive"));
    }

    if user.role != auth_user.role || user.email != auth_user.email {
        tracing::warn!(
            "User validation failed: token for '{}' ({}) doesn't match stored '{}' ({})",
            auth_user.email, auth_user.role, user.email, user.role
        );
        return Err(ApiError::unauthorized("Token no longer matches user, please log in again"));
    }

    tracing::debug!("User validation successful: {} ({})", user.email, user.role);

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}
