use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Case;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::case_service::{CaseFilters, CreateCaseInput, DocumentInput, TimelineInput, UpdateCaseInput};
use crate::services::{CaseService, Page};

/// GET /api/cases - `?status=&client_id=&priority=&degraded=&limit=&offset=`
///
/// Admins see every case, lawyers the cases they are assigned to and clients the
/// cases of their linked client records.
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<CaseFilters>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Case>> {
    Ok(ApiResponse::success(CaseService::new(state).list(&auth, filters, page).await?))
}

/// GET /api/cases/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Case> {
    Ok(ApiResponse::success(CaseService::new(state).get(&auth, id).await?))
}

/// POST /api/cases - Admin, Lawyer
///
/// Expected Input:
/// ```json
/// { "title": "Lease dispute", "client_id": "...", "case_type": "civil", "priority": "high" }
/// ```
///
/// The response carries the allocated `case_number`, e.g. `CASE-2024-0007`.
/// `number_degraded: true` marks a number issued while the sequence was unavailable.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateCaseInput>, JsonRejection>,
) -> ApiResult<Case> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(CaseService::new(state).create(&auth, input).await?))
}

/// PUT /api/cases/:id - Admin or an assigned lawyer
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateCaseInput>, JsonRejection>,
) -> ApiResult<Case> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::success(CaseService::new(state).update(&auth, id, input).await?))
}

/// DELETE /api/cases/:id - Admin only
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_admin()?;
    CaseService::new(state).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/cases/:id/documents
pub async fn add_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<DocumentInput>, JsonRejection>,
) -> ApiResult<Case> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(CaseService::new(state).add_document(&auth, id, input).await?))
}

/// DELETE /api/cases/:id/documents/:doc_id
pub async fn remove_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Case> {
    auth.require_staff()?;
    Ok(ApiResponse::success(CaseService::new(state).remove_document(&auth, id, doc_id).await?))
}

/// POST /api/cases/:id/timeline
pub async fn add_timeline_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<TimelineInput>, JsonRejection>,
) -> ApiResult<Case> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(CaseService::new(state).add_timeline_event(&auth, id, input).await?))
}
