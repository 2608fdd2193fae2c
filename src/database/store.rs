use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::FilterData;

/// Fields that must be unique within their collection. Postgres enforces these with
/// expression indexes named `{collection}_{field}_key`; the memory backend checks them on write.
pub const UNIQUE_FIELDS: &[(&str, &str)] = &[
    ("users", "email"),
    ("cases", "case_number"),
    ("invoices", "invoice_number"),
];

pub fn unique_constraint_name(collection: &str, field: &str) -> String {
    format!("{}_{}_key", collection, field)
}

/// Named counter record. On first use the counter is seeded with the number of
/// documents in `collection` whose `field` starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterKey {
    pub name: String,
    pub collection: &'static str,
    pub field: &'static str,
    pub prefix: String,
}

/// Storage for JSON documents grouped into collections.
///
/// Every document is stored under a UUID and carries its own `id`, `created_at` and
/// `updated_at` fields in the JSON body; backends do not rewrite the body.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; fails with `UniqueViolation` on duplicate ids or unique fields.
    async fn insert(&self, collection: &str, id: Uuid, doc: Value) -> Result<(), DatabaseError>;

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Value>, DatabaseError>;

    async fn find(&self, collection: &str, filter: FilterData) -> Result<Vec<Value>, DatabaseError>;

    /// Count matching documents. Ordering and paging in the filter are ignored.
    async fn count(&self, collection: &str, filter: FilterData) -> Result<i64, DatabaseError>;

    /// Replace an existing document. Returns false when no document has that id.
    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> Result<bool, DatabaseError>;

    async fn remove(&self, collection: &str, id: Uuid) -> Result<bool, DatabaseError>;

    /// Atomically increment the named counter and return the new value.
    async fn increment_counter(&self, key: &CounterKey) -> Result<i64, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;

    fn backend_name(&self) -> &'static str;
}
