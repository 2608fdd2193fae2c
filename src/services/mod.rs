pub mod bootstrap;
pub mod case_service;
pub mod client_service;
pub mod invoice_service;
pub mod message_service;
pub mod notice_service;
pub mod time_entry_service;
pub mod user_service;

use serde::Deserialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::config;
use crate::database::DatabaseError;
use crate::filter::FilterData;
use crate::sequence::AllocationError;

pub use case_service::CaseService;
pub use client_service::ClientService;
pub use invoice_service::InvoiceService;
pub use message_service::MessageService;
pub use notice_service::NoticeService;
pub use time_entry_service::TimeEntryService;
pub use user_service::UserService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation { field: Option<String>, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ServiceError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// `?limit=&offset=` on list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl Page {
    /// Newest first, with the configured default page size.
    pub fn apply(&self, filter: FilterData) -> FilterData {
        let limit = self.limit.unwrap_or(config::config().filter.default_limit).max(0);
        filter
            .order_by("created_at desc")
            .page(Some(limit), self.offset.map(|o| o.max(0)))
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid(field, format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Blank optional strings are stored as `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
