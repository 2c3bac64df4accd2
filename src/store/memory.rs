use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use super::{ScoreRecord, ScoreStore, StoreResult, UpsertOutcome, identity_key, rank};

/// Volatile score store used when no durable backend is available.
#[derive(Clone, Default)]
pub struct MemoryScoreStore {
    records: Arc<DashMap<String, ScoreRecord>>,
}

impl MemoryScoreStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`, keeping the best record per identity.
    pub fn with_records(records: impl IntoIterator<Item = ScoreRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert_if_higher(record);
        }
        store
    }

    /// Raise the stored record for `identity` to `score` if it is higher.
    ///
    /// The comparison and the write happen under the map's entry lock, so
    /// concurrent upserts for the same identity are serialized.
    pub(crate) fn raise(&self, identity: &str, score: u32) -> UpsertOutcome {
        self.insert_if_higher(ScoreRecord::new(identity.trim(), score))
    }

    fn insert_if_higher(&self, record: ScoreRecord) -> UpsertOutcome {
        match self.records.entry(identity_key(&record.identity)) {
            Entry::Occupied(mut entry) => {
                if record.score > entry.get().score {
                    entry.insert(record);
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Unchanged
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
                UpsertOutcome::Updated
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<ScoreRecord> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn load(&self) -> BoxFuture<'static, StoreResult<Vec<ScoreRecord>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.snapshot()) })
    }

    fn get(&self, identity: &str) -> BoxFuture<'static, StoreResult<Option<ScoreRecord>>> {
        let store = self.clone();
        let key = identity_key(identity);
        Box::pin(async move { Ok(store.records.get(&key).map(|entry| entry.value().clone())) })
    }

    fn upsert(&self, identity: &str, score: u32) -> BoxFuture<'static, StoreResult<UpsertOutcome>> {
        let outcome = self.raise(identity, score);
        Box::pin(async move { Ok(outcome) })
    }

    fn top(&self, n: usize) -> BoxFuture<'static, StoreResult<Vec<ScoreRecord>>> {
        let store = self.clone();
        Box::pin(async move { Ok(rank(store.snapshot(), n)) })
    }
}
