use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::store::{CounterKey, DocumentStore};
use crate::filter::{Filter, FilterData};

const BUMP_COUNTER_SQL: &str =
    "UPDATE sequence_counters SET value = value + 1, updated_at = now() WHERE name = $1 RETURNING value";

/// Seeds a counter from the identifiers already stored under its prefix.
fn seed_counter_sql(table: &str, field: &str) -> String {
    format!(
        r#"
        INSERT INTO sequence_counters (name, value)
        VALUES ($1, (SELECT COUNT(*) FROM {table} WHERE doc->>'{field}' LIKE $2) + 1)
        ON CONFLICT (name) DO UPDATE
            SET value = sequence_counters.value + 1, updated_at = now()
        RETURNING value
        "#,
        table = table,
        field = field,
    )
}

/// Postgres backend: one table per collection holding `(id, doc JSONB, created_at, updated_at)`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect through the shared pool cache, applying migrations when configured.
    pub async fn connect() -> Result<Self, DatabaseError> {
        let pool = DatabaseManager::main_pool().await?;
        if crate::config::config().database.run_migrations {
            DatabaseManager::migrate().await?;
        }
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table(collection: &str) -> Result<String, DatabaseError> {
        // Filter::new validates the identifier
        Filter::new(collection)?;
        Ok(format!("\"{}\"", collection))
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(&self, collection: &str, id: Uuid, doc: Value) -> Result<(), DatabaseError> {
        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", Self::table(collection)?);
        sqlx::query(&sql).bind(id).bind(doc).execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Value>, DatabaseError> {
        let sql = format!("SELECT doc FROM {} WHERE id = $1", Self::table(collection)?);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<Value, _>("doc")?)),
            None => Ok(None),
        }
    }

    async fn find(&self, collection: &str, filter: FilterData) -> Result<Vec<Value>, DatabaseError> {
        let mut compiled = Filter::new(collection)?;
        compiled.assign(filter)?;
        let sql = compiled.to_sql()?;

        let mut query = sqlx::query(&sql.query);
        for param in sql.params {
            query = query.bind(param);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| row.try_get::<Value, _>("doc").map_err(DatabaseError::from))
            .collect()
    }

    async fn count(&self, collection: &str, filter: FilterData) -> Result<i64, DatabaseError> {
        let mut compiled = Filter::new(collection)?;
        if let Some(where_clause) = filter.where_clause {
            compiled.where_clause(where_clause)?;
        }
        let sql = compiled.to_count_sql()?;

        let mut query = sqlx::query(&sql.query);
        for param in sql.params {
            query = query.bind(param);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    async fn replace(&self, collection: &str, id: Uuid, doc: Value) -> Result<bool, DatabaseError> {
        let sql = format!(
            "UPDATE {} SET doc = $2, updated_at = now() WHERE id = $1",
            Self::table(collection)?
        );
        let result = sqlx::query(&sql).bind(id).bind(doc).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<bool, DatabaseError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", Self::table(collection)?);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_counter(&self, key: &CounterKey) -> Result<i64, DatabaseError> {
        let table = Self::table(key.collection)?;
        if !crate::filter::filter::is_identifier(key.field) {
            return Err(DatabaseError::QueryError(format!("Invalid counter field: {}", key.field)));
        }

        let bumped = sqlx::query(BUMP_COUNTER_SQL)
            .bind(&key.name)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = bumped {
            return Ok(row.try_get::<i64, _>("value")?);
        }

        // First use of this key. A concurrent seeder loses the insert and increments instead.
        let row = sqlx::query(&seed_counter_sql(&table, key.field))
            .bind(&key.name)
            .bind(format!("{}%", key.prefix))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("value")?)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_counters_bump_without_counting() {
        assert!(BUMP_COUNTER_SQL.starts_with("UPDATE sequence_counters"));
        assert!(!BUMP_COUNTER_SQL.contains("COUNT"));
        assert!(seed_counter_sql("\"cases\"", "case_number").contains("doc->>'case_number' LIKE $2"));
    }

    #[test]
    fn identifier_indexes_serve_prefix_scans() {
        let schema = include_str!("../../migrations/0001_init.sql");
        for index in ["cases_case_number_key", "invoices_invoice_number_key"] {
            let line = schema
                .lines()
                .find(|l| l.contains(index))
                .unwrap_or_else(|| panic!("missing index {}", index));
            assert!(line.contains("text_pattern_ops"), "{}", line);
        }
    }
}
