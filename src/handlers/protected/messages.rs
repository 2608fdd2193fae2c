use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Message;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::message_service::{MessageFilters, SendMessageInput};
use crate::services::{MessageService, Page};

/// GET /api/messages - `?box=inbox|sent&unread=&case_id=`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<MessageFilters>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Message>> {
    Ok(ApiResponse::success(MessageService::new(state).list(&auth, filters, page).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Message> {
    Ok(ApiResponse::success(MessageService::new(state).get(&auth, id).await?))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<SendMessageInput>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(MessageService::new(state).send(&auth, input).await?))
}

/// PUT /api/messages/:id/read - Recipient only
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Message> {
    Ok(ApiResponse::success(MessageService::new(state).mark_read(&auth, id).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    MessageService::new(state).delete(&auth, id).await?;
    Ok(ApiResponse::no_content())
}
