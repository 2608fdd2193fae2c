//! Year-scoped, human-readable identifiers for cases and invoices.
//!
//! Identifiers look like `CASE-2024-0001` / `INV-2024-0001`: a kind prefix, the
//! four-digit creation year and a sequence padded to at least four digits. The
//! sequence restarts at 1 every year. Allocation only computes the identifier;
//! the storage uniqueness constraint decides whether it can be kept, and
//! [`SequenceAllocator::insert_numbered`] retries with a fresh number when it can't.

pub mod allocator;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::database::{CounterKey, DatabaseError, Document};

pub use allocator::SequenceAllocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    Case,
    Invoice,
}

impl SequenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SequenceKind::Case => "CASE",
            SequenceKind::Invoice => "INV",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            SequenceKind::Case => "cases",
            SequenceKind::Invoice => "invoices",
        }
    }

    /// Document field holding the identifier.
    pub fn field(&self) -> &'static str {
        match self {
            SequenceKind::Case => "case_number",
            SequenceKind::Invoice => "invoice_number",
        }
    }

    /// `CASE-2024-`
    pub fn year_prefix(&self, year: i32) -> String {
        format!("{}-{}-", self.prefix(), year)
    }

    pub fn counter_key(&self, year: i32) -> CounterKey {
        CounterKey {
            name: format!("{}-{}", self.prefix(), year),
            collection: self.collection(),
            field: self.field(),
            prefix: self.year_prefix(year),
        }
    }
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceKind::Case => f.write_str("case"),
            SequenceKind::Invoice => f.write_str("invoice"),
        }
    }
}

/// `{PREFIX}-{year}-{sequence}` with the sequence zero-padded to four digits.
/// Wider sequences are written in full.
pub fn format_identifier(kind: SequenceKind, year: i32, sequence: i64) -> String {
    format!("{}{:04}", kind.year_prefix(year), sequence)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationSource {
    /// The caller already carried an identifier.
    Supplied,
    /// Taken from the store's sequence.
    Sequenced,
    /// Timestamp-derived; the store could not produce a sequence.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub identifier: String,
    pub sequence: Option<i64>,
    pub source: AllocationSource,
}

impl Allocation {
    pub fn is_degraded(&self) -> bool {
        self.source == AllocationSource::Fallback
    }
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("{kind} number sequence unavailable: {source}")]
    Unavailable {
        kind: SequenceKind,
        #[source]
        source: DatabaseError,
    },

    #[error("{kind} number {identifier} is already in use")]
    Duplicate { kind: SequenceKind, identifier: String },

    #[error("could not assign a unique {kind} number after {attempts} attempts")]
    Exhausted { kind: SequenceKind, attempts: u32 },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A document that receives a sequential identifier on first save.
pub trait Sequenced: Document {
    const KIND: SequenceKind;

    /// Creation time; its year scopes the sequence.
    fn created_at(&self) -> DateTime<Utc>;

    /// Current identifier, `None` when blank.
    fn identifier(&self) -> Option<&str>;

    fn assign_identifier(&mut self, allocation: &Allocation);

    fn clear_identifier(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_four_digits_and_widens() {
        assert_eq!(format_identifier(SequenceKind::Case, 2024, 1), "CASE-2024-0001");
        assert_eq!(format_identifier(SequenceKind::Case, 2024, 42), "CASE-2024-0042");
        assert_eq!(format_identifier(SequenceKind::Invoice, 2024, 9999), "INV-2024-9999");
        assert_eq!(format_identifier(SequenceKind::Invoice, 2024, 10000), "INV-2024-10000");
        assert_eq!(format_identifier(SequenceKind::Case, 2031, 123456), "CASE-2031-123456");
    }

    #[test]
    fn counter_keys_are_per_kind_and_year() {
        let key = SequenceKind::Invoice.counter_key(2025);
        assert_eq!(key.name, "INV-2025");
        assert_eq!(key.prefix, "INV-2025-");
        assert_eq!(key.collection, "invoices");
        assert_eq!(key.field, "invoice_number");
        assert_ne!(key.name, SequenceKind::Case.counter_key(2025).name);
    }
}
