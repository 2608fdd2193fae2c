use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::UserProfile;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::user_service::{CreateUserInput, UpdateUserInput, UserFilters};
use crate::services::{Page, UserService};

/// GET /api/users - Staff only; `?role=&active=&limit=&offset=`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<UserFilters>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<UserProfile>> {
    auth.require_staff()?;
    let users = UserService::new(state).list(filters, page).await?;
    Ok(ApiResponse::success(users.iter().map(|u| u.profile()).collect()))
}

/// GET /api/users/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserProfile> {
    auth.require_staff()?;
    let user = UserService::new(state).get(id).await?;
    Ok(ApiResponse::success(user.profile()))
}

/// POST /api/users - Admin only
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateUserInput>, JsonRejection>,
) -> ApiResult<UserProfile> {
    auth.require_admin()?;
    let Json(input) = payload?;
    let user = UserService::new(state).create(input).await?;
    Ok(ApiResponse::created(user.profile()))
}

/// PUT /api/users/:id - Admin only
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateUserInput>, JsonRejection>,
) -> ApiResult<UserProfile> {
    auth.require_admin()?;
    let Json(input) = payload?;
    let user = UserService::new(state).update(&auth, id, input).await?;
    Ok(ApiResponse::success(user.profile()))
}

/// DELETE /api/users/:id - Admin only, never yourself
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_admin()?;
    UserService::new(state).delete(&auth, id).await?;
    Ok(ApiResponse::no_content())
}
