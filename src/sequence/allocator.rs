use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, error, warn};

use super::{format_identifier, Allocation, AllocationError, AllocationSource, SequenceKind, Sequenced};
use crate::config::{FallbackMode, SequenceConfig, SequenceStrategy};
use crate::database::{DatabaseError, DocumentStore, Repository};
use crate::filter::FilterData;

pub struct SequenceAllocator {
    store: Arc<dyn DocumentStore>,
    config: SequenceConfig,
    degraded: AtomicU64,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn DocumentStore>, config: SequenceConfig) -> Self {
        Self {
            store,
            config,
            degraded: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Number of fallback identifiers issued since startup.
    pub fn degraded_count(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Compute the identifier for a new `kind` record created at `created_at`.
    ///
    /// A non-blank `existing` identifier is returned unchanged without touching the store.
    /// Nothing is written to the record's collection; the caller persists it.
    pub async fn allocate(
        &self,
        kind: SequenceKind,
        created_at: DateTime<Utc>,
        existing: Option<&str>,
    ) -> Result<Allocation, AllocationError> {
        if let Some(identifier) = existing.filter(|s| !s.trim().is_empty()) {
            return Ok(Allocation {
                identifier: identifier.to_string(),
                sequence: None,
                source: AllocationSource::Supplied,
            });
        }

        let year = created_at.year();
        match self.next_sequence(kind, year).await {
            Ok(sequence) => Ok(Allocation {
                identifier: format_identifier(kind, year, sequence),
                sequence: Some(sequence),
                source: AllocationSource::Sequenced,
            }),
            Err(err) => match self.config.fallback {
                FallbackMode::Strict => {
                    error!("Sequence query for {} {} failed: {}", kind, year, err);
                    Err(AllocationError::Unavailable { kind, source: err })
                }
                FallbackMode::Degrade => {
                    let identifier = fallback_identifier(kind, year, Utc::now());
                    let total = self.degraded.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        "Sequence query for {} {} failed ({}); issued fallback number {} ({} since startup)",
                        kind, year, err, identifier, total
                    );
                    Ok(Allocation {
                        identifier,
                        sequence: None,
                        source: AllocationSource::Fallback,
                    })
                }
            },
        }
    }

    /// Allocate a number for `record` and insert it. When the insert hits the uniqueness
    /// constraint with an allocated number, a fresh number is tried, up to
    /// `max_create_attempts`. A supplied number that collides fails at once.
    pub async fn insert_numbered<T: Sequenced>(
        &self,
        repository: &Repository<T>,
        mut record: T,
    ) -> Result<T, AllocationError> {
        let supplied = record.identifier().is_some();
        let attempts = self.config.max_create_attempts.max(1);

        for attempt in 1..=attempts {
            let allocation = self
                .allocate(T::KIND, record.created_at(), record.identifier())
                .await?;
            record.assign_identifier(&allocation);

            match repository.insert(&record).await {
                Ok(()) => return Ok(record),
                Err(DatabaseError::UniqueViolation(constraint)) => {
                    if supplied {
                        return Err(AllocationError::Duplicate {
                            kind: T::KIND,
                            identifier: allocation.identifier,
                        });
                    }
                    warn!(
                        "{} number {} rejected by {} (attempt {}/{})",
                        T::KIND, allocation.identifier, constraint, attempt, attempts
                    );
                    record.clear_identifier();
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AllocationError::Exhausted { kind: T::KIND, attempts })
    }

    async fn next_sequence(&self, kind: SequenceKind, year: i32) -> Result<i64, DatabaseError> {
        let attempts = self.config.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempt = 1;

        loop {
            match self.query_sequence(kind, year).await {
                Ok(sequence) => return Ok(sequence),
                Err(err) if attempt < attempts => {
                    debug!(
                        "Sequence query for {} {} failed on attempt {}/{}: {}; retrying in {:?}",
                        kind, year, attempt, attempts, err, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn query_sequence(&self, kind: SequenceKind, year: i32) -> Result<i64, DatabaseError> {
        match self.config.strategy {
            SequenceStrategy::Counter => self.store.increment_counter(&kind.counter_key(year)).await,
            SequenceStrategy::Count => {
                // Read-then-write: concurrent callers can observe the same count.
                let filter = FilterData::eq(kind.field(), serde_json::json!({ "$like": format!("{}%", kind.year_prefix(year)) }));
                let count = self.store.count(kind.collection(), filter).await?;
                Ok(count + 1)
            }
        }
    }
}

/// Identifier used when the store cannot produce a sequence: the last four digits of the
/// current epoch milliseconds. Not guaranteed unique.
pub fn fallback_identifier(kind: SequenceKind, year: i32, now: DateTime<Utc>) -> String {
    format_identifier(kind, year, now.timestamp_millis().rem_euclid(10_000))
}
