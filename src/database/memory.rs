use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{unique_constraint_name, CounterKey, DocumentStore, UNIQUE_FIELDS};
use crate::filter::{Filter, FilterData, FilterMatcher};

type Collection = Vec<(Uuid, Value)>;

/// In-process backend with the same unique constraints and counter semantics as Postgres.
/// Documents keep insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    counters: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matcher(collection: &str, filter: FilterData) -> Result<FilterMatcher, DatabaseError> {
        let mut compiled = Filter::new(collection)?;
        compiled.assign(filter)?;
        Ok(FilterMatcher::new(&compiled)?)
    }

    fn check_unique(
        collection: &str,
        docs: &[(Uuid, Value)],
        id: Uuid,
        doc: &Value,
    ) -> Result<(), DatabaseError> {
        for (_, field) in UNIQUE_FIELDS.iter().filter(|(c, _)| *c == collection) {
            let Some(value) = doc.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = docs
                .iter()
                .any(|(other_id, other)| *other_id != id && other.get(*field) == Some(value));
            if taken {
                return Err(DatabaseError::UniqueViolation(unique_constraint_name(collection, field)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, id: Uuid, doc: Value) -> Result<(), DatabaseError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|(existing, _)| *existing == id) {
            return Err(DatabaseError::UniqueViolation(format!("{}_pkey", collection)));
        }
        Self::check_unique(collection, docs, id, &doc)?;
        docs.push((id, doc));
        Ok(())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Value>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|(existing, _)| *existing == id))
            .map(|(_, doc)| doc.clone()))
    }

    async fn find(&self, collection: &str, filter: FilterData) -> Result<Vec<Value>, DatabaseError> {
        let matcher = Self::matcher(collection, filter)?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(vec![]);
        };
        Ok(matcher.apply(docs.iter().map(|(_, doc)| doc)))
    }

    async fn count(&self, collection: &str, filter: FilterData) -> Result<i64, DatabaseError> {
        let where_only = FilterData { where_clause: filter.where_clause, ..Default::default() };
        let matcher = Self::matcher(collection, where_only)?;
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|(_, doc)| matcher.matches(doc)).count())
            .unwrap_or(0);
        Ok(count as i64)
    }

    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> Result<bool, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        Self::check_unique(collection, docs, id, &doc)?;
        match docs.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => {
                slot.1 = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<bool, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|(existing, _)| *existing != id);
        Ok(docs.len() != before)
    }

    async fn increment_counter(&self, key: &CounterKey) -> Result<i64, DatabaseError> {
        // Holding the counters lock across the seed read keeps increment-and-get atomic.
        let mut counters = self.counters.lock().await;
        let next = match counters.get(&key.name) {
            Some(current) => current + 1,
            None => {
                let collections = self.collections.read().await;
                let seeded = collections
                    .get(key.collection)
                    .map(|docs| {
                        docs.iter()
                            .filter(|(_, doc)| {
                                doc.get(key.field)
                                    .and_then(Value::as_str)
                                    .map(|s| s.starts_with(&key.prefix))
                                    .unwrap_or(false)
                            })
                            .count()
                    })
                    .unwrap_or(0);
                seeded as i64 + 1
            }
        };
        counters.insert(key.name.clone(), next);
        Ok(next)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn case_key(prefix: &str) -> CounterKey {
        CounterKey {
            name: prefix.trim_end_matches('-').to_string(),
            collection: "cases",
            field: "case_number",
            prefix: prefix.to_string(),
        }
    }

    #[tokio::test]
    async fn enforces_unique_fields() {
        let store = MemoryStore::new();
        store
            .insert("cases", Uuid::new_v4(), json!({ "case_number": "CASE-2024-0001" }))
            .await
            .unwrap();

        let err = store
            .insert("cases", Uuid::new_v4(), json!({ "case_number": "CASE-2024-0001" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(ref c) if c == "cases_case_number_key"));

        // Different collections do not share constraints
        store
            .insert("notes", Uuid::new_v4(), json!({ "case_number": "CASE-2024-0001" }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replace_checks_uniqueness_against_other_documents() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert("users", a, json!({ "email": "a@firm.test" })).await.unwrap();
        store.insert("users", b, json!({ "email": "b@firm.test" })).await.unwrap();

        // Rewriting a document with its own value is fine
        assert!(store.replace("users", a, json!({ "email": "a@firm.test", "name": "A" })).await.unwrap());
        assert!(store.replace("users", b, json!({ "email": "a@firm.test" })).await.is_err());
        assert!(!store.replace("users", Uuid::new_v4(), json!({})).await.unwrap());
    }

    #[tokio::test]
    async fn finds_counts_and_removes() {
        let store = MemoryStore::new();
        for (n, status) in [(1, "open"), (2, "closed"), (3, "open")] {
            store
                .insert("cases", Uuid::new_v4(), json!({ "n": n, "status": status }))
                .await
                .unwrap();
        }

        let open = store.find("cases", FilterData::eq("status", "open").order_by("n desc")).await.unwrap();
        assert_eq!(open.iter().map(|d| d["n"].as_i64().unwrap()).collect::<Vec<_>>(), vec![3, 1]);

        let paged = FilterData::eq("status", "open").page(Some(1), None);
        assert_eq!(store.count("cases", paged).await.unwrap(), 2);

        let id = Uuid::new_v4();
        store.insert("cases", id, json!({ "n": 4 })).await.unwrap();
        assert!(store.remove("cases", id).await.unwrap());
        assert!(!store.remove("cases", id).await.unwrap());
        assert!(store.get("cases", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counter_seeds_from_existing_prefix() {
        let store = MemoryStore::new();
        for number in ["CASE-2024-0001", "CASE-2024-0002", "CASE-2023-0001"] {
            store
                .insert("cases", Uuid::new_v4(), json!({ "case_number": number }))
                .await
                .unwrap();
        }

        let key = case_key("CASE-2024-");
        assert_eq!(store.increment_counter(&key).await.unwrap(), 3);
        assert_eq!(store.increment_counter(&key).await.unwrap(), 4);
        assert_eq!(store.increment_counter(&case_key("CASE-2025-")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counter_is_atomic_under_concurrency() {
        let store = Arc::new(MemoryStore::new());
        let key = case_key("CASE-2024-");

        let calls = (0..50).map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.increment_counter(&key).await.unwrap() })
        });
        let mut values: Vec<i64> = futures::future::join_all(calls)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        values.sort_unstable();

        assert_eq!(values, (1..=50).collect::<Vec<_>>());
    }
}
