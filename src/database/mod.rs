pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

use std::sync::Arc;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{Document, Repository};
pub use store::{CounterKey, DocumentStore};

use crate::config::{AppConfig, StorageBackend};

/// Open the document store selected by `storage.backend`.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
    match config.storage.backend {
        StorageBackend::Postgres => Ok(Arc::new(PgStore::connect().await?)),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
