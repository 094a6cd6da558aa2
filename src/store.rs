//! Persistence interface for providers and their verification history.
//!
//! The CRM only talks to storage through [`ProviderStore`] and [`HistoryStore`], so the
//! service and its handlers can run against [`MemoryStore`] in tests and against a
//! database-backed implementation in deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::crm::types::{HistoryRecord, ProviderRecord};

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Provider records keyed by `provider_id`.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn get(&self, provider_id: &str) -> Result<Option<ProviderRecord>, StoreError>;

    /// All providers, most recently updated first.
    async fn list(&self) -> Result<Vec<ProviderRecord>, StoreError>;

    /// Inserts the record, replacing any record with the same `provider_id`.
    async fn upsert(&self, record: ProviderRecord) -> Result<(), StoreError>;

    /// Removes a provider. Returns `false` if it did not exist.
    async fn delete(&self, provider_id: &str) -> Result<bool, StoreError>;
}

/// Append-only log of verification attempts.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> Result<(), StoreError>;

    /// Up to `limit` records for a provider, newest first.
    async fn list(
        &self,
        provider_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, StoreError>;

    /// Drops every record of a provider.
    async fn purge(&self, provider_id: &str) -> Result<(), StoreError>;

    /// Number of records, across all providers, at or after `since`.
    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Everything the CRM needs from storage.
pub trait CrmStore: ProviderStore + HistoryStore {}

impl<T: ProviderStore + HistoryStore> CrmStore for T {}

/// In-memory [`CrmStore`], safe for concurrent use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    providers: DashMap<String, ProviderRecord>,
    history: DashMap<String, Vec<HistoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderStore for MemoryStore {
    async fn get(&self, provider_id: &str) -> Result<Option<ProviderRecord>, StoreError> {
        Ok(self.providers.get(provider_id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<ProviderRecord>, StoreError> {
        let mut records: Vec<ProviderRecord> = self
            .providers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn upsert(&self, record: ProviderRecord) -> Result<(), StoreError> {
        self.providers.insert(record.provider_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, provider_id: &str) -> Result<bool, StoreError> {
        Ok(self.providers.remove(provider_id).is_some())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), StoreError> {
        self.history
            .entry(record.provider_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn list(
        &self,
        provider_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        let Some(records) = self.history.get(provider_id) else {
            return Ok(Vec::new());
        };
        let mut records = records.value().clone();
        // Stable sort keeps insertion order for equal timestamps; reverse makes it newest first.
        records.sort_by_key(|record| record.timestamp);
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    async fn purge(&self, provider_id: &str) -> Result<(), StoreError> {
        self.history.remove(provider_id);
        Ok(())
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        let count = self
            .history
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|record| record.timestamp >= since)
                    .count() as u64
            })
            .sum();
        Ok(count)
    }
}
