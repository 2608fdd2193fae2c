use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Invoice;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::invoice_service::{CreateInvoiceInput, InvoiceFilters, PaymentInput, UpdateInvoiceInput};
use crate::services::{InvoiceService, Page};

/// GET /api/invoices - `?status=&client_id=&case_id=&degraded=`
///
/// Clients only see invoices addressed to their linked client records.
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<InvoiceFilters>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Invoice>> {
    Ok(ApiResponse::success(InvoiceService::new(state).list(&auth, filters, page).await?))
}

/// GET /api/invoices/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Invoice> {
    Ok(ApiResponse::success(InvoiceService::new(state).get(&auth, id).await?))
}

/// POST /api/invoices - Admin, Lawyer
///
/// Expected Input:
/// ```json
/// {
///   "case_id": "...",
///   "include_unbilled_time": true,
///   "items": [{ "description": "Court filing fee", "quantity": "1", "rate": "150.00" }],
///   "tax_rate": "7.5"
/// }
/// ```
///
/// The response carries the allocated `invoice_number`, e.g. `INV-2024-0012`.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateInvoiceInput>, JsonRejection>,
) -> ApiResult<Invoice> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(InvoiceService::new(state).create(&auth, input).await?))
}

/// PUT /api/invoices/:id - Admin, Lawyer
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateInvoiceInput>, JsonRejection>,
) -> ApiResult<Invoice> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::success(InvoiceService::new(state).update(id, input).await?))
}

/// DELETE /api/invoices/:id - Admin only; billed time entries become unbilled again
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.require_admin()?;
    InvoiceService::new(state).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/invoices/:id/payments - `{ "amount": "120.00" }`; 400 on overpayment
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<PaymentInput>, JsonRejection>,
) -> ApiResult<Invoice> {
    auth.require_staff()?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(InvoiceService::new(state).record_payment(&auth, id, input).await?))
}
