// handlers/public/auth/register.rs - POST /auth/register handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use super::{issue_token, TokenResponse};
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::user_service::RegisterInput;
use crate::services::UserService;

/// POST /auth/register - Self-service signup for clients
///
/// Creates a `client` user together with the client record it is linked to and
/// returns a token, so the portal can log the new user straight in. Answers 403
/// when registration is disabled and 409 when the email is taken.
pub async fn register_post(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let Json(input) = payload?;
    let user = UserService::new(state).register(input).await?;
    Ok(ApiResponse::created(issue_token(&user)?))
}
