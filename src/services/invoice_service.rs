use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{optional_text, require_text, ClientService, Page, ServiceError, ServiceResult};
use crate::app::AppState;
use crate::database::models::{
    round_money, Case, Client, Invoice, InvoiceItem, InvoiceStatus, Payment, Role, TimeEntry,
};
use crate::database::DatabaseError;
use crate::filter::FilterData;
use crate::middleware::AuthUser;

const DEFAULT_PAYMENT_TERMS_DAYS: u64 = 30;

#[derive(Debug, Deserialize)]
pub struct ItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceInput {
    /// Taken from the case when omitted.
    pub client_id: Option<Uuid>,
    pub case_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<ItemInput>,
    /// Bill the case's unbilled billable time entries as additional lines.
    #[serde(default)]
    pub include_unbilled_time: bool,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub invoice_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateInvoiceInput {
    /// Replaces the manual lines; lines generated from time entries are kept.
    pub items: Option<Vec<ItemInput>>,
    pub tax_rate: Option<Decimal>,
    pub status: Option<InvoiceStatus>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentInput {
    pub amount: Decimal,
    pub method: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilters {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub case_id: Option<Uuid>,
    pub degraded: Option<bool>,
}

pub struct InvoiceService {
    state: AppState,
}

impl InvoiceService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn list(&self, actor: &AuthUser, filters: InvoiceFilters, page: Page) -> ServiceResult<Vec<Invoice>> {
        let mut filter = FilterData::new();
        if actor.role == Role::Client {
            let client_ids = ClientService::new(self.state.clone()).ids_for_user(actor.user_id).await?;
            filter.and_where("client_id", serde_json::json!({ "$in": client_ids }));
        }
        if let Some(status) = filters.status {
            filter.and_where("status", status);
        }
        if let Some(client_id) = filters.client_id {
            filter.and_where("client_id", client_id);
        }
        if let Some(case_id) = filters.case_id {
            filter.and_where("case_id", case_id);
        }
        if let Some(degraded) = filters.degraded {
            filter.and_where("number_degraded", degraded);
        }
        Ok(self.state.repo::<Invoice>().select_any(page.apply(filter)).await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<Invoice> {
        let invoice = self.state.repo::<Invoice>().select_404(id).await?;
        if actor.role == Role::Client {
            let client_ids = ClientService::new(self.state.clone()).ids_for_user(actor.user_id).await?;
            if !client_ids.contains(&invoice.client_id) {
                return Err(ServiceError::forbidden("You do not have access to this invoice"));
            }
        }
        Ok(invoice)
    }

    pub async fn create(&self, actor: &AuthUser, input: CreateInvoiceInput) -> ServiceResult<Invoice> {
        let case = match input.case_id {
            Some(case_id) => Some(
                self.state
                    .repo::<Case>()
                    .select_by_id(case_id)
                    .await?
                    .ok_or_else(|| ServiceError::invalid("case_id", "Case does not exist"))?,
            ),
            None => None,
        };

        let client_id = match (input.client_id, &case) {
            (Some(client_id), Some(case)) if client_id != case.client_id => {
                return Err(ServiceError::invalid("client_id", "Case belongs to a different client"));
            }
            (Some(client_id), _) => client_id,
            (None, Some(case)) => case.client_id,
            (None, None) => return Err(ServiceError::invalid("client_id", "client_id or case_id is required")),
        };
        self.state
            .repo::<Client>()
            .select_by_id(client_id)
            .await?
            .ok_or_else(|| ServiceError::invalid("client_id", "Client does not exist"))?;

        let mut items = build_items(input.items)?;
        let mut entries = Vec::new();
        if input.include_unbilled_time {
            let case = case
                .as_ref()
                .ok_or_else(|| ServiceError::invalid("case_id", "Billing time entries requires a case"))?;
            entries = self.unbilled_entries(case.id).await?;
            items.extend(entries.iter().map(|entry| InvoiceItem {
                description: format!("{}: {}", entry.date, entry.description),
                quantity: entry.hours,
                rate: entry.hourly_rate,
                amount: Decimal::ZERO,
                time_entry_id: Some(entry.id),
            }));
        }
        if items.is_empty() {
            return Err(ServiceError::invalid("items", "An invoice needs at least one line item"));
        }
        validate_tax_rate(input.tax_rate)?;

        let now = Utc::now();
        let issue_date = input.issue_date.unwrap_or_else(|| now.date_naive());
        let due_date = match input.due_date {
            Some(due) => due,
            None => issue_date
                .checked_add_days(Days::new(DEFAULT_PAYMENT_TERMS_DAYS))
                .unwrap_or(issue_date),
        };
        if due_date < issue_date {
            return Err(ServiceError::invalid("due_date", "Due date cannot be before the issue date"));
        }

        let mut invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: input.invoice_number.map(|n| n.trim().to_string()).unwrap_or_default(),
            number_degraded: false,
            client_id,
            case_id: case.as_ref().map(|c| c.id),
            items,
            time_entry_ids: entries.iter().map(|e| e.id).collect(),
            subtotal: Decimal::ZERO,
            tax_rate: input.tax_rate,
            tax_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            payments: vec![],
            status: InvoiceStatus::Draft,
            issue_date,
            due_date,
            notes: optional_text(input.notes),
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };
        invoice.recompute();

        let invoice = self
            .state
            .sequences
            .insert_numbered(&self.state.repo::<Invoice>(), invoice)
            .await?;

        if let Err((linked, err)) = self.link_entries(&entries, Some(invoice.id)).await {
            tracing::error!("Billing time for invoice {} failed, withdrawing it: {}", invoice.invoice_number, err);
            self.restore_entries(&entries[..linked], None).await;
            if let Err(e) = self.state.repo::<Invoice>().delete(invoice.id).await {
                tracing::error!("Could not withdraw invoice {}: {}", invoice.id, e);
            }
            return Err(err.into());
        }

        tracing::info!("Issued invoice {} ({}) total {}", invoice.invoice_number, invoice.id, invoice.total);
        Ok(invoice)
    }

    pub async fn update(&self, id: Uuid, input: UpdateInvoiceInput) -> ServiceResult<Invoice> {
        let mut invoice = self.state.repo::<Invoice>().select_404(id).await?;
        let locked = matches!(invoice.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled);

        if locked && (input.items.is_some() || input.tax_rate.is_some()) {
            return Err(ServiceError::Conflict(format!(
                "Invoice {} is {} and its lines can no longer change",
                invoice.invoice_number,
                status_label(invoice.status)
            )));
        }

        if let Some(items) = input.items {
            let mut lines: Vec<InvoiceItem> = invoice
                .items
                .into_iter()
                .filter(|item| item.time_entry_id.is_some())
                .collect();
            lines.extend(build_items(items)?);
            if lines.is_empty() {
                return Err(ServiceError::invalid("items", "An invoice needs at least one line item"));
            }
            invoice.items = lines;
        }
        if let Some(tax_rate) = input.tax_rate {
            validate_tax_rate(tax_rate)?;
            invoice.tax_rate = tax_rate;
        }
        if let Some(issue_date) = input.issue_date {
            invoice.issue_date = issue_date;
        }
        if let Some(due_date) = input.due_date {
            invoice.due_date = due_date;
        }
        if invoice.due_date < invoice.issue_date {
            return Err(ServiceError::invalid("due_date", "Due date cannot be before the issue date"));
        }
        if input.notes.is_some() {
            invoice.notes = optional_text(input.notes);
        }

        invoice.recompute();
        if invoice.total < invoice.amount_paid {
            return Err(ServiceError::Conflict(format!(
                "Invoice total {} would fall below the {} already paid",
                invoice.total, invoice.amount_paid
            )));
        }
        match input.status {
            Some(InvoiceStatus::Paid) if invoice.balance_due() > Decimal::ZERO => {
                return Err(ServiceError::invalid("status", "Record payments to mark an invoice paid"));
            }
            Some(status) => invoice.status = status,
            None if !locked && invoice.amount_paid > Decimal::ZERO && invoice.balance_due() == Decimal::ZERO => {
                invoice.status = InvoiceStatus::Paid;
            }
            None => {}
        }
        invoice.updated_at = Utc::now();
        self.state.repo::<Invoice>().update(&invoice).await?;
        Ok(invoice)
    }

    /// Removes the invoice and returns its time entries to the unbilled pool.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        self.state.repo::<Invoice>().select_404(id).await?;

        let billed = self
            .state
            .repo::<TimeEntry>()
            .select_any(FilterData::eq("invoice_id", id))
            .await?;
        if let Err((released, err)) = self.link_entries(&billed, None).await {
            self.restore_entries(&billed[..released], Some(id)).await;
            return Err(err.into());
        }
        if let Err(err) = self.state.repo::<Invoice>().delete(id).await {
            self.restore_entries(&billed, Some(id)).await;
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn record_payment(&self, actor: &AuthUser, id: Uuid, input: PaymentInput) -> ServiceResult<Invoice> {
        let mut invoice = self.state.repo::<Invoice>().select_404(id).await?;

        if invoice.status == InvoiceStatus::Cancelled {
            return Err(ServiceError::Conflict("Cannot record a payment on a cancelled invoice".to_string()));
        }
        let amount = round_money(input.amount);
        if amount <= Decimal::ZERO {
            return Err(ServiceError::invalid("amount", "Payment amount must be greater than 0"));
        }
        if amount > invoice.balance_due() {
            return Err(ServiceError::invalid(
                "amount",
                format!("Payment of {} exceeds the balance due of {}", amount, invoice.balance_due()),
            ));
        }

        let now = Utc::now();
        invoice.payments.push(Payment {
            id: Uuid::new_v4(),
            amount,
            method: optional_text(input.method),
            reference: optional_text(input.reference),
            received_at: now,
            recorded_by: actor.user_id,
        });
        invoice.amount_paid += amount;
        if invoice.balance_due() == Decimal::ZERO {
            invoice.status = InvoiceStatus::Paid;
        }
        invoice.updated_at = now;

        self.state.repo::<Invoice>().update(&invoice).await?;
        tracing::info!("Payment of {} recorded on invoice {}", amount, invoice.invoice_number);
        Ok(invoice)
    }

    /// Points each entry at `invoice_id`, stopping at the first failed write.
    /// On failure returns how many entries were written along with the error.
    async fn link_entries(&self, entries: &[TimeEntry], invoice_id: Option<Uuid>) -> Result<(), (usize, DatabaseError)> {
        let now = Utc::now();
        for (written, entry) in entries.iter().enumerate() {
            let mut entry = entry.clone();
            entry.invoice_id = invoice_id;
            entry.updated_at = now;
            self.state.repo::<TimeEntry>().update(&entry).await.map_err(|e| (written, e))?;
        }
        Ok(())
    }

    async fn restore_entries(&self, entries: &[TimeEntry], invoice_id: Option<Uuid>) {
        for entry in entries {
            let mut entry = entry.clone();
            entry.invoice_id = invoice_id;
            if let Err(e) = self.state.repo::<TimeEntry>().update(&entry).await {
                tracing::error!("Time entry {} left pointing at the wrong invoice: {}", entry.id, e);
            }
        }
    }

    async fn unbilled_entries(&self, case_id: Uuid) -> ServiceResult<Vec<TimeEntry>> {
        let mut filter = FilterData::eq("case_id", case_id);
        filter
            .and_where("billable", true)
            .and_where("invoice_id", serde_json::json!({ "$exists": false }));
        Ok(self
            .state
            .repo::<TimeEntry>()
            .select_any(filter.order_by("date asc"))
            .await?)
    }
}

fn build_items(inputs: Vec<ItemInput>) -> ServiceResult<Vec<InvoiceItem>> {
    inputs
        .into_iter()
        .map(|input| {
            if input.quantity <= Decimal::ZERO {
                return Err(ServiceError::invalid("items", "Item quantity must be greater than 0"));
            }
            if input.rate.is_sign_negative() {
                return Err(ServiceError::invalid("items", "Item rate cannot be negative"));
            }
            Ok(InvoiceItem {
                description: require_text("description", &input.description)?,
                quantity: input.quantity,
                rate: input.rate,
                amount: Decimal::ZERO,
                time_entry_id: None,
            })
        })
        .collect()
}

fn validate_tax_rate(rate: Decimal) -> ServiceResult<()> {
    if rate.is_sign_negative() || rate > Decimal::ONE_HUNDRED {
        return Err(ServiceError::invalid("tax_rate", "Tax rate must be between 0 and 100"));
    }
    Ok(())
}

fn status_label(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Draft => "draft",
        InvoiceStatus::Sent => "sent",
        InvoiceStatus::Paid => "paid",
        InvoiceStatus::Overdue => "overdue",
        InvoiceStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::case_service::CreateCaseInput;
    use crate::services::client_service::ClientInput;
    use crate::services::time_entry_service::TimeEntryInput;
    use crate::services::user_service::CreateUserInput;
    use crate::services::{CaseService, TimeEntryService, UserService};
    use crate::config::SequenceConfig;
    use crate::database::{CounterKey, DocumentStore, MemoryStore};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    /// Memory store that drops one time entry write after `fail_after` successful ones.
    struct EntryWriteFailures {
        inner: MemoryStore,
        /// Negative when disarmed.
        countdown: AtomicI32,
    }

    impl EntryWriteFailures {
        fn new() -> Self {
            Self { inner: MemoryStore::new(), countdown: AtomicI32::new(-1) }
        }

        fn fail_after(&self, writes: i32) {
            self.countdown.store(writes, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DocumentStore for EntryWriteFailures {
        async fn insert(&self, collection: &str, id: Uuid, doc: Value) -> Result<(), DatabaseError> {
            self.inner.insert(collection, id, doc).await
        }
        async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Value>, DatabaseError> {
            self.inner.get(collection, id).await
        }
        async fn find(&self, collection: &str, filter: FilterData) -> Result<Vec<Value>, DatabaseError> {
            self.inner.find(collection, filter).await
        }
        async fn count(&self, collection: &str, filter: FilterData) -> Result<i64, DatabaseError> {
            self.inner.count(collection, filter).await
        }
        async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> Result<bool, DatabaseError> {
            if collection == "time_entries" {
                let left = self.countdown.load(Ordering::SeqCst);
                if left >= 0 {
                    self.countdown.store(left - 1, Ordering::SeqCst);
                }
                if left == 0 {
                    return Err(DatabaseError::ConnectionError("connection reset".to_string()));
                }
            }
            self.inner.replace(collection, id, doc).await
        }
        async fn remove(&self, collection: &str, id: Uuid) -> Result<bool, DatabaseError> {
            self.inner.remove(collection, id).await
        }
        async fn increment_counter(&self, key: &CounterKey) -> Result<i64, DatabaseError> {
            self.inner.increment_counter(key).await
        }
        async fn ping(&self) -> Result<(), DatabaseError> {
            Ok(())
        }
        fn backend_name(&self) -> &'static str {
            "entry-write-failures"
        }
    }

    struct Setup {
        state: AppState,
        lawyer: AuthUser,
        client_id: Uuid,
        case_id: Uuid,
    }

    async fn setup() -> Setup {
        setup_with(AppState::in_memory()).await
    }

    async fn setup_with(state: AppState) -> Setup {
        let user = UserService::new(state.clone())
            .create(CreateUserInput {
                name: "Lee".to_string(),
                email: "lee@firm.test".to_string(),
                password: "password123".to_string(),
                role: Role::Lawyer,
                phone: None,
            })
            .await
            .unwrap();
        let lawyer = AuthUser { user_id: user.id, email: user.email, role: Role::Lawyer };
        let client = ClientService::new(state.clone())
            .create(
                &lawyer,
                ClientInput {
                    name: "Acme".to_string(),
                    email: None,
                    phone: None,
                    address: None,
                    company: None,
                    client_type: Default::default(),
                    assigned_lawyer: None,
                    user_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        let case = CaseService::new(state.clone())
            .create(
                &lawyer,
                CreateCaseInput {
                    title: "Acquisition".to_string(),
                    description: None,
                    client_id: client.id,
                    assigned_lawyers: vec![],
                    case_type: Default::default(),
                    priority: Default::default(),
                    court: None,
                    opened_at: None,
                    case_number: None,
                },
            )
            .await
            .unwrap();
        Setup { state, lawyer, client_id: client.id, case_id: case.id }
    }

    fn manual(client_id: Uuid, quantity: Decimal, rate: Decimal) -> CreateInvoiceInput {
        CreateInvoiceInput {
            client_id: Some(client_id),
            case_id: None,
            items: vec![ItemInput { description: "Filing fee".to_string(), quantity, rate }],
            include_unbilled_time: false,
            tax_rate: Decimal::ZERO,
            issue_date: None,
            due_date: None,
            notes: None,
            invoice_number: None,
        }
    }

    #[tokio::test]
    async fn invoices_are_numbered_in_creation_order() {
        let s = setup().await;
        let invoices = InvoiceService::new(s.state.clone());
        let year = Utc::now().format("%Y").to_string();

        for n in 1..=3 {
            let invoice = invoices
                .create(&s.lawyer, manual(s.client_id, Decimal::ONE, Decimal::new(100, 0)))
                .await
                .unwrap();
            assert_eq!(invoice.invoice_number, format!("INV-{}-{:04}", year, n));
            assert_eq!(invoice.due_date, invoice.issue_date + Days::new(30));
        }
    }

    #[tokio::test]
    async fn unbilled_time_is_billed_once_and_released_on_delete() {
        let s = setup().await;
        let entries = TimeEntryService::new(s.state.clone());
        for hours in [Decimal::new(2, 0), Decimal::new(5, 1)] {
            entries
                .create(
                    &s.lawyer,
                    TimeEntryInput {
                        case_id: s.case_id,
                        description: "Due diligence".to_string(),
                        date: None,
                        hours,
                        hourly_rate: Decimal::new(250, 0),
                        billable: true,
                    },
                )
                .await
                .unwrap();
        }

        let invoices = InvoiceService::new(s.state.clone());
        let input = || CreateInvoiceInput {
            client_id: None,
            case_id: Some(s.case_id),
            items: vec![],
            include_unbilled_time: true,
            tax_rate: Decimal::new(10, 0),
            issue_date: None,
            due_date: None,
            notes: None,
            invoice_number: None,
        };

        let invoice = invoices.create(&s.lawyer, input()).await.unwrap();
        assert_eq!(invoice.client_id, s.client_id);
        assert_eq!(invoice.time_entry_ids.len(), 2);
        assert_eq!(invoice.subtotal, Decimal::new(625, 0));
        assert_eq!(invoice.total, Decimal::new(6875, 1));

        // Nothing left to bill.
        assert!(matches!(invoices.create(&s.lawyer, input()).await, Err(ServiceError::Validation { .. })));

        invoices.delete(invoice.id).await.unwrap();
        let again = invoices.create(&s.lawyer, input()).await.unwrap();
        assert_eq!(again.time_entry_ids.len(), 2);
    }

    #[tokio::test]
    async fn payments_settle_the_invoice_and_reject_overpayment() {
        let s = setup().await;
        let invoices = InvoiceService::new(s.state.clone());
        let invoice = invoices
            .create(&s.lawyer, manual(s.client_id, Decimal::new(2, 0), Decimal::new(5000, 2)))
            .await
            .unwrap();
        let pay = |amount| PaymentInput { amount, method: None, reference: None };

        let partial = invoices.record_payment(&s.lawyer, invoice.id, pay(Decimal::new(40, 0))).await.unwrap();
        assert_eq!(partial.status, InvoiceStatus::Draft);

        assert!(matches!(
            invoices.record_payment(&s.lawyer, invoice.id, pay(Decimal::new(61, 0))).await,
            Err(ServiceError::Validation { .. })
        ));

        let paid = invoices.record_payment(&s.lawyer, invoice.id, pay(Decimal::new(60, 0))).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.payments.len(), 2);
        assert_eq!(paid.balance_due(), Decimal::ZERO);

        assert!(matches!(
            invoices
                .update(invoice.id, UpdateInvoiceInput { tax_rate: Some(Decimal::ONE), ..Default::default() })
                .await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn invoice_requires_lines_and_a_known_client() {
        let s = setup().await;
        let invoices = InvoiceService::new(s.state.clone());

        let mut empty = manual(s.client_id, Decimal::ONE, Decimal::ONE);
        empty.items.clear();
        assert!(matches!(invoices.create(&s.lawyer, empty).await, Err(ServiceError::Validation { .. })));

        assert!(matches!(
            invoices.create(&s.lawyer, manual(Uuid::new_v4(), Decimal::ONE, Decimal::ONE)).await,
            Err(ServiceError::Validation { .. })
        ));
    }

    async fn log_time(s: &Setup, hours: i64) {
        TimeEntryService::new(s.state.clone())
            .create(
                &s.lawyer,
                TimeEntryInput {
                    case_id: s.case_id,
                    description: "Drafting".to_string(),
                    date: None,
                    hours: Decimal::new(hours, 0),
                    hourly_rate: Decimal::new(200, 0),
                    billable: true,
                },
            )
            .await
            .unwrap();
    }

    fn bill_case(case_id: Uuid) -> CreateInvoiceInput {
        CreateInvoiceInput {
            client_id: None,
            case_id: Some(case_id),
            items: vec![],
            include_unbilled_time: true,
            tax_rate: Decimal::ZERO,
            issue_date: None,
            due_date: None,
            notes: None,
            invoice_number: None,
        }
    }

    async fn entries_billed_to(state: &AppState, invoice_id: Option<Uuid>) -> usize {
        state
            .repo::<TimeEntry>()
            .select_any(FilterData::new())
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.invoice_id == invoice_id)
            .count()
    }

    #[tokio::test]
    async fn edits_cannot_drop_the_total_below_what_was_paid() {
        let s = setup().await;
        let invoices = InvoiceService::new(s.state.clone());
        let invoice = invoices
            .create(&s.lawyer, manual(s.client_id, Decimal::new(2, 0), Decimal::new(5000, 2)))
            .await
            .unwrap();
        invoices
            .record_payment(&s.lawyer, invoice.id, PaymentInput { amount: Decimal::new(80, 0), method: None, reference: None })
            .await
            .unwrap();

        let shrink = |quantity, rate| UpdateInvoiceInput {
            items: Some(vec![ItemInput { description: "Filing fee".to_string(), quantity, rate }]),
            ..Default::default()
        };
        assert!(matches!(
            invoices.update(invoice.id, shrink(Decimal::ONE, Decimal::new(10, 0))).await,
            Err(ServiceError::Conflict(_))
        ));
        let stored = invoices.get(&s.lawyer, invoice.id).await.unwrap();
        assert_eq!(stored.total, Decimal::new(100, 0));

        let settled = invoices.update(invoice.id, shrink(Decimal::ONE, Decimal::new(80, 0))).await.unwrap();
        assert_eq!(settled.balance_due(), Decimal::ZERO);
        assert_eq!(settled.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn lowering_tax_below_payments_is_refused() {
        let s = setup().await;
        let invoices = InvoiceService::new(s.state.clone());
        let mut input = manual(s.client_id, Decimal::ONE, Decimal::new(100, 0));
        input.tax_rate = Decimal::new(10, 0);
        let invoice = invoices.create(&s.lawyer, input).await.unwrap();
        invoices
            .record_payment(&s.lawyer, invoice.id, PaymentInput { amount: Decimal::new(105, 0), method: None, reference: None })
            .await
            .unwrap();

        let untaxed = UpdateInvoiceInput { tax_rate: Some(Decimal::ZERO), ..Default::default() };
        assert!(matches!(invoices.update(invoice.id, untaxed).await, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn failed_billing_withdraws_the_invoice_and_frees_the_time() {
        let store = Arc::new(EntryWriteFailures::new());
        let s = setup_with(AppState::new(store.clone(), SequenceConfig::default())).await;
        for hours in [1, 2, 3] {
            log_time(&s, hours).await;
        }
        let invoices = InvoiceService::new(s.state.clone());

        store.fail_after(1);
        assert!(invoices.create(&s.lawyer, bill_case(s.case_id)).await.is_err());
        assert!(s.state.repo::<Invoice>().select_any(FilterData::new()).await.unwrap().is_empty());
        assert_eq!(entries_billed_to(&s.state, None).await, 3);

        let invoice = invoices.create(&s.lawyer, bill_case(s.case_id)).await.unwrap();
        assert_eq!(invoice.time_entry_ids.len(), 3);
        assert_eq!(entries_billed_to(&s.state, Some(invoice.id)).await, 3);
    }

    #[tokio::test]
    async fn failed_release_keeps_the_invoice_and_its_time() {
        let store = Arc::new(EntryWriteFailures::new());
        let s = setup_with(AppState::new(store.clone(), SequenceConfig::default())).await;
        for hours in [1, 2, 3] {
            log_time(&s, hours).await;
        }
        let invoices = InvoiceService::new(s.state.clone());
        let invoice = invoices.create(&s.lawyer, bill_case(s.case_id)).await.unwrap();

        store.fail_after(2);
        assert!(invoices.delete(invoice.id).await.is_err());

        assert!(s.state.repo::<Invoice>().select_by_id(invoice.id).await.unwrap().is_some());
        assert_eq!(entries_billed_to(&s.state, Some(invoice.id)).await, 3);
    }
}
