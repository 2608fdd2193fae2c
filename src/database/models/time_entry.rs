use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{round_money, timestamp};
use crate::database::repository::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: Uuid,
    pub case_id: Uuid,
    pub lawyer_id: Uuid,
    pub description: String,
    pub date: NaiveDate,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    /// hours × hourly_rate, kept in sync by `recompute`.
    pub amount: Decimal,
    pub billable: bool,
    pub invoice_id: Option<Uuid>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn recompute(&mut self) {
        self.amount = round_money(self.hours * self.hourly_rate);
    }

    pub fn is_invoiced(&self) -> bool {
        self.invoice_id.is_some()
    }
}

impl Document for TimeEntry {
    const COLLECTION: &'static str = "time_entries";
    const LABEL: &'static str = "Time entry";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_hours_times_rate_to_cents() {
        let now = Utc::now();
        let mut entry = TimeEntry {
            id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            lawyer_id: Uuid::new_v4(),
            description: "Drafting".to_string(),
            date: now.date_naive(),
            hours: Decimal::new(125, 2),      // 1.25
            hourly_rate: Decimal::new(3333, 1), // 333.3
            amount: Decimal::ZERO,
            billable: true,
            invoice_id: None,
            created_at: now,
            updated_at: now,
        };
        entry.recompute();
        // 416.625 rounds half away from zero
        assert_eq!(entry.amount, Decimal::new(41663, 2));
    }
}
