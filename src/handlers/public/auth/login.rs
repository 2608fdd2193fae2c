// handlers/public/auth/login.rs - POST /auth/login handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use super::{issue_token, TokenResponse};
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::UserService;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - Authenticate user and receive JWT token
///
/// Expected Input:
/// ```json
/// { "email": "lee@firm.test", "password": "..." }
/// ```
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiI...",
///     "user": { "id": "...", "email": "lee@firm.test", "role": "lawyer", ... },
///     "expires_in": 86400
///   }
/// }
/// ```
///
/// Unknown email, wrong password and inactive accounts all answer 401.
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let Json(request) = payload?;
    let user = UserService::new(state)
        .authenticate(&request.email, &request.password)
        .await?;

    tracing::info!("User '{}' logged in", user.email);
    Ok(ApiResponse::success(issue_token(&user)?))
}
