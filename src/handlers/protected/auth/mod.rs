use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::UserProfile;
use crate::handlers::public::auth::{issue_token, TokenResponse};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, CurrentUser};
use crate::services::UserService;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/auth/whoami - Current user, as stored
pub async fn whoami(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(user.profile()))
}

/// PUT /api/auth/password - Change own password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(request) = payload?;
    UserService::new(state)
        .change_password(auth.user_id, &request.current_password, &request.new_password)
        .await?;
    tracing::info!("User '{}' changed their password", auth.email);
    Ok(ApiResponse::no_content())
}

/// POST /api/auth/refresh - Fresh token for the current user
///
/// The token is built from the stored user, so role or email changes made by an
/// admin are picked up without a new login.
pub async fn refresh(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult<TokenResponse> {
    Ok(ApiResponse::success(issue_token(&user)?))
}
