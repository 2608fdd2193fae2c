use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::TimeEntry;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::time_entry_service::{TimeEntryFilters, TimeEntryInput, TimeEntryUpdate};
use crate::services::{Page, TimeEntryService};

// Time tracking is staff-only; lawyers are scoped to their own entries by the service.

/// GET /api/time-entries - `?case_id=&lawyer_id=&billable=&unbilled=`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<TimeEntryFilters>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<TimeEntry>> {
    auth.require_staff()?;
    Ok(ApiResponse::success(TimeEntryService::new(state).list(&auth, filters, page).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<TimeEntry> {
    auth.require_staff()?;
    Ok(ApiResponse::success(TimeEntryService::new(state).get(&auth, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<TimeEntryInput>, JsonRejection>,
) -> ApiResult<TimeEntry> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(TimeEntryService::new(state).create(&auth, input).await?))
}

/// PUT /api/time-entries/:id - 409 once the entry is on an invoice
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<TimeEntryUpdate>, JsonRejection>,
) -> ApiResult<TimeEntry> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::success(TimeEntryService::new(state).update(&auth, id, input).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_staff()?;
    TimeEntryService::new(state).delete(&auth, id).await?;
    Ok(ApiResponse::no_content())
}
