use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timestamp;
use crate::database::repository::Document;
use crate::sequence::{Allocation, SequenceKind, Sequenced};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Civil,
    Criminal,
    Family,
    Corporate,
    Property,
    Labor,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Open,
    InProgress,
    OnHold,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::OnHold => "on_hold",
            CaseStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDocument {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub doc_type: Option<String>,
    pub uploaded_by: Uuid,
    #[serde(with = "timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    Hearing,
    Filing,
    Meeting,
    Deadline,
    StatusChange,
    #[default]
    Note,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub event_type: TimelineEventType,
    #[serde(with = "timestamp")]
    pub event_date: DateTime<Utc>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: Uuid,
    /// `CASE-{year}-{seq}`; assigned once on first save.
    pub case_number: String,
    /// Set when the number came from the timestamp fallback rather than the sequence.
    #[serde(default)]
    pub number_degraded: bool,
    pub title: String,
    pub description: Option<String>,
    pub client_id: Uuid,
    pub assigned_lawyers: Vec<Uuid>,
    pub case_type: CaseType,
    pub status: CaseStatus,
    pub priority: CasePriority,
    pub court: Option<String>,
    pub opened_at: NaiveDate,
    #[serde(default, with = "timestamp::option")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub documents: Vec<CaseDocument>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    pub created_by: Uuid,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Apply a status transition: closing stamps `closed_at`, reopening clears it,
    /// and every real change is recorded on the timeline.
    pub fn transition(&mut self, status: CaseStatus, by: Uuid) {
        if status == self.status {
            return;
        }
        let now = Utc::now();
        let previous = self.status;
        self.status = status;
        self.closed_at = if status == CaseStatus::Closed { Some(now) } else { None };
        self.timeline.push(TimelineEvent {
            id: Uuid::new_v4(),
            title: format!("Status changed from {} to {}", previous.as_str(), status.as_str()),
            description: None,
            event_type: TimelineEventType::StatusChange,
            event_date: now,
            created_by: by,
        });
    }

    pub fn is_assigned(&self, user_id: Uuid) -> bool {
        self.assigned_lawyers.contains(&user_id)
    }
}

impl Document for Case {
    const COLLECTION: &'static str = "cases";
    const LABEL: &'static str = "Case";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Sequenced for Case {
    const KIND: SequenceKind = SequenceKind::Case;

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn identifier(&self) -> Option<&str> {
        Some(self.case_number.as_str()).filter(|n| !n.trim().is_empty())
    }

    fn assign_identifier(&mut self, allocation: &Allocation) {
        self.case_number = allocation.identifier.clone();
        self.number_degraded = allocation.is_degraded();
    }

    fn clear_identifier(&mut self) {
        self.case_number.clear();
        self.number_degraded = false;
    }
}
