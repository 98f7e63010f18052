use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::record::ScoreRecord;

/// Durable keyed storage of favorability records.
///
/// Implementations only need per-call atomicity; the engine serializes
/// read-modify-write cycles for a person itself.
pub trait ScoreStore: Send + Sync {
    fn get(
        &self,
        person_id: &str,
    ) -> impl Future<Output = Result<Option<ScoreRecord>, StoreError>> + Send;

    /// Load the record, creating it at the default score if it does not exist.
    fn get_or_create(
        &self,
        person_id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<ScoreRecord, StoreError>> + Send;

    fn save(&self, record: &ScoreRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_all(&self) -> impl Future<Output = Result<Vec<ScoreRecord>, StoreError>> + Send;
}

/// Process-local store, used by tests and by hosts without a database.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    records: RwLock<HashMap<String, ScoreRecord>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreStore for MemoryScoreStore {
    async fn get(&self, person_id: &str) -> Result<Option<ScoreRecord>, StoreError> {
        Ok(self.records.read().await.get(person_id).cloned())
    }

    async fn get_or_create(
        &self,
        person_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ScoreRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .entry(person_id.to_string())
            .or_insert_with(|| ScoreRecord::new(person_id, now));
        Ok(record.clone())
    }

    async fn save(&self, record: &ScoreRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let created_at = records
            .get(&record.person_id)
            .map(|existing| existing.created_at)
            .unwrap_or(record.created_at);
        let mut stored = record.clone();
        stored.created_at = created_at;
        records.insert(stored.person_id.clone(), stored);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
