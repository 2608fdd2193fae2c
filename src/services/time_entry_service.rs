use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{require_text, CaseService, Page, ServiceError, ServiceResult};
use crate::app::AppState;
use crate::database::models::{Case, Role, TimeEntry};
use crate::filter::FilterData;
use crate::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct TimeEntryInput {
    pub case_id: Uuid,
    pub description: String,
    pub date: Option<NaiveDate>,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    #[serde(default = "default_billable")]
    pub billable: bool,
}

fn default_billable() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeEntryUpdate {
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub hours: Option<Decimal>,
    pub hourly_rate: Option<Decimal>,
    pub billable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeEntryFilters {
    pub case_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
    pub billable: Option<bool>,
    /// `true` for entries not yet on an invoice.
    pub unbilled: Option<bool>,
}

pub struct TimeEntryService {
    state: AppState,
}

impl TimeEntryService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Lawyers see their own entries; admins see everything.
    pub async fn list(&self, actor: &AuthUser, filters: TimeEntryFilters, page: Page) -> ServiceResult<Vec<TimeEntry>> {
        let mut filter = FilterData::new();
        if actor.role == Role::Lawyer {
            filter.and_where("lawyer_id", actor.user_id);
        } else if let Some(lawyer_id) = filters.lawyer_id {
            filter.and_where("lawyer_id", lawyer_id);
        }
        if let Some(case_id) = filters.case_id {
            filter.and_where("case_id", case_id);
        }
        if let Some(billable) = filters.billable {
            filter.and_where("billable", billable);
        }
        if let Some(unbilled) = filters.unbilled {
            filter.and_where("invoice_id", serde_json::json!({ "$exists": !unbilled }));
        }
        Ok(self.state.repo::<TimeEntry>().select_any(page.apply(filter)).await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<TimeEntry> {
        let entry = self.state.repo::<TimeEntry>().select_404(id).await?;
        if actor.role == Role::Lawyer && entry.lawyer_id != actor.user_id {
            return Err(ServiceError::forbidden("You can only access your own time entries"));
        }
        Ok(entry)
    }

    pub async fn create(&self, actor: &AuthUser, input: TimeEntryInput) -> ServiceResult<TimeEntry> {
        let case = self
            .state
            .repo::<Case>()
            .select_by_id(input.case_id)
            .await?
            .ok_or_else(|| ServiceError::invalid("case_id", "Case does not exist"))?;
        CaseService::new(self.state.clone()).ensure_visible(actor, &case).await?;

        validate_hours(input.hours)?;
        validate_rate(input.hourly_rate)?;

        let now = Utc::now();
        let mut entry = TimeEntry {
            id: Uuid::new_v4(),
            case_id: case.id,
            lawyer_id: actor.user_id,
            description: require_text("description", &input.description)?,
            date: input.date.unwrap_or_else(|| now.date_naive()),
            hours: input.hours,
            hourly_rate: input.hourly_rate,
            amount: Decimal::ZERO,
            billable: input.billable,
            invoice_id: None,
            created_at: now,
            updated_at: now,
        };
        entry.recompute();

        self.state.repo::<TimeEntry>().insert(&entry).await?;
        Ok(entry)
    }

    pub async fn update(&self, actor: &AuthUser, id: Uuid, input: TimeEntryUpdate) -> ServiceResult<TimeEntry> {
        let mut entry = self.get_unbilled(actor, id).await?;

        if let Some(description) = input.description {
            entry.description = require_text("description", &description)?;
        }
        if let Some(date) = input.date {
            entry.date = date;
        }
        if let Some(hours) = input.hours {
            validate_hours(hours)?;
            entry.hours = hours;
        }
        if let Some(rate) = input.hourly_rate {
            validate_rate(rate)?;
            entry.hourly_rate = rate;
        }
        if let Some(billable) = input.billable {
            entry.billable = billable;
        }
        entry.recompute();
        entry.updated_at = Utc::now();

        self.state.repo::<TimeEntry>().update(&entry).await?;
        Ok(entry)
    }

    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<()> {
        self.get_unbilled(actor, id).await?;
        self.state.repo::<TimeEntry>().delete(id).await?;
        Ok(())
    }

    async fn get_unbilled(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<TimeEntry> {
        let entry = self.get(actor, id).await?;
        if entry.is_invoiced() {
            return Err(ServiceError::Conflict("Time entry is already on an invoice".to_string()));
        }
        Ok(entry)
    }
}

fn validate_hours(hours: Decimal) -> ServiceResult<()> {
    if hours <= Decimal::ZERO || hours > Decimal::new(24, 0) {
        return Err(ServiceError::invalid("hours", "Hours must be greater than 0 and at most 24"));
    }
    Ok(())
}

fn validate_rate(rate: Decimal) -> ServiceResult<()> {
    if rate.is_sign_negative() {
        return Err(ServiceError::invalid("hourly_rate", "Hourly rate cannot be negative"));
    }
    Ok(())
}
