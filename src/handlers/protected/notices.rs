use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Notice;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::notice_service::{NoticeFilters, NoticeInput, NoticeUpdate};
use crate::services::{NoticeService, Page};

/// GET /api/notices - Audience-filtered, unexpired; admins may add `?include_expired=true`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<NoticeFilters>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Notice>> {
    Ok(ApiResponse::success(NoticeService::new(state).list(&auth, filters, page).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Notice> {
    Ok(ApiResponse::success(NoticeService::new(state).get(&auth, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<NoticeInput>, JsonRejection>,
) -> ApiResult<Notice> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(NoticeService::new(state).create(&auth, input).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<NoticeUpdate>, JsonRejection>,
) -> ApiResult<Notice> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::success(NoticeService::new(state).update(&auth, id, input).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_staff()?;
    NoticeService::new(state).delete(&auth, id).await?;
    Ok(ApiResponse::no_content())
}
