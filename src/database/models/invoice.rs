use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{round_money, timestamp};
use crate::database::repository::Document;
use crate::sequence::{Allocation, SequenceKind, Sequenced};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    #[serde(default)]
    pub amount: Decimal,
    /// Set when the line was generated from a time entry.
    #[serde(default)]
    pub time_entry_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub amount: Decimal,
    pub method: Option<String>,
    pub reference: Option<String>,
    #[serde(with = "timestamp")]
    pub received_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    /// `INV-{year}-{seq}`; assigned once on first save.
    pub invoice_number: String,
    #[serde(default)]
    pub number_degraded: bool,
    pub client_id: Uuid,
    pub case_id: Option<Uuid>,
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    pub time_entry_ids: Vec<Uuid>,
    pub subtotal: Decimal,
    /// Percent, e.g. 7.5
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    #[serde(default)]
    pub payments: Vec<Payment>,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: Uuid,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Recompute line amounts and totals from items and tax rate.
    pub fn recompute(&mut self) {
        for item in &mut self.items {
            item.amount = round_money(item.quantity * item.rate);
        }
        self.subtotal = round_money(self.items.iter().map(|i| i.amount).sum());
        self.tax_amount = round_money(self.subtotal * self.tax_rate / Decimal::ONE_HUNDRED);
        self.total = round_money(self.subtotal + self.tax_amount);
    }

    pub fn balance_due(&self) -> Decimal {
        self.total - self.amount_paid
    }
}

impl Document for Invoice {
    const COLLECTION: &'static str = "invoices";
    const LABEL: &'static str = "Invoice";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Sequenced for Invoice {
    const KIND: SequenceKind = SequenceKind::Invoice;

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn identifier(&self) -> Option<&str> {
        Some(self.invoice_number.as_str()).filter(|n| !n.trim().is_empty())
    }

    fn assign_identifier(&mut self, allocation: &Allocation) {
        self.invoice_number = allocation.identifier.clone();
        self.number_degraded = allocation.is_degraded();
    }

    fn clear_identifier(&mut self) {
        self.invoice_number.clear();
        self.number_degraded = false;
    }
}
