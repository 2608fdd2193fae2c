use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Client;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::client_service::{ClientFilters, ClientInput, ClientUpdate};
use crate::services::{ClientService, Page};

/// GET /api/clients - Clients only see records linked to their login
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<ClientFilters>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Client>> {
    let clients = ClientService::new(state).list(&auth, filters, page).await?;
    Ok(ApiResponse::success(clients))
}

/// GET /api/clients/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Client> {
    Ok(ApiResponse::success(ClientService::new(state).get(&auth, id).await?))
}

/// POST /api/clients - Admin, Lawyer
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<ClientInput>, JsonRejection>,
) -> ApiResult<Client> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(ClientService::new(state).create(&auth, input).await?))
}

/// PUT /api/clients/:id - Admin, Lawyer
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ClientUpdate>, JsonRejection>,
) -> ApiResult<Client> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::success(ClientService::new(state).update(&auth, id, input).await?))
}

/// DELETE /api/clients/:id - Admin only; 409 while the client has cases
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_admin()?;
    ClientService::new(state).delete(id).await?;
    Ok(ApiResponse::no_content())
}
