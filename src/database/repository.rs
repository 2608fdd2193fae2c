use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::DocumentStore;
use crate::filter::FilterData;

/// A typed record kept in a document collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Human-readable name used in error messages.
    const LABEL: &'static str;

    fn id(&self) -> Uuid;
}

pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub async fn insert(&self, record: &T) -> Result<(), DatabaseError> {
        let doc = serde_json::to_value(record)?;
        self.store.insert(T::COLLECTION, record.id(), doc).await
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        let docs = self.store.find(T::COLLECTION, filter_data).await?;
        docs.into_iter().map(Self::decode).collect()
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        let filter_data = FilterData { limit: Some(1), ..filter_data };
        let mut docs = self.store.find(T::COLLECTION, filter_data).await?;
        match docs.pop() {
            Some(doc) => Ok(Some(Self::decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn select_by_id(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(Self::decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn select_404(&self, id: Uuid) -> Result<T, DatabaseError> {
        self.select_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", T::LABEL)))
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        self.store.count(T::COLLECTION, filter_data).await
    }

    pub async fn select_ids(&self, ids: &[Uuid]) -> Result<Vec<T>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let filter = FilterData {
            where_clause: Some(json!({ "id": { "$in": ids } })),
            ..Default::default()
        };
        self.select_any(filter).await
    }

    pub async fn update(&self, record: &T) -> Result<(), DatabaseError> {
        let doc = serde_json::to_value(record)?;
        if self.store.replace(T::COLLECTION, record.id(), doc).await? {
            Ok(())
        } else {
            Err(DatabaseError::NotFound(format!("{} not found", T::LABEL)))
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        if self.store.remove(T::COLLECTION, id).await? {
            Ok(())
        } else {
            Err(DatabaseError::NotFound(format!("{} not found", T::LABEL)))
        }
    }

    fn decode(doc: Value) -> Result<T, DatabaseError> {
        Ok(serde_json::from_value(doc)?)
    }
}
