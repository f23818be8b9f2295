//! In-memory record store
//!
//! For testing and DST simulations.

use crate::record::{Record, RecordKey, RecordStore};
use async_trait::async_trait;
use cairn_core::Result;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Operation counters, for asserting what a caller did or did not write
#[derive(Debug, Default)]
struct OpCounters {
    gets: AtomicU64,
    creates: AtomicU64,
    updates: AtomicU64,
}

/// In-memory record store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<BTreeMap<RecordKey, Record>>>,
    counters: Arc<OpCounters>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served
    pub fn get_count(&self) -> u64 {
        self.counters.gets.load(Ordering::SeqCst)
    }

    /// Number of successful `create` and `update` calls
    pub fn write_count(&self) -> u64 {
        self.counters.creates.load(Ordering::SeqCst) + self.counters.updates.load(Ordering::SeqCst)
    }

    /// Number of records held
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Overwrite a record without going through the create/update contract
    ///
    /// Simulates an out-of-band edit of persisted state.
    pub async fn put_raw(&self, key: RecordKey, record: Record) {
        self.records.write().await.insert(key, record);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &RecordKey) -> Result<Record> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read().await;
        records.get(key).cloned().ok_or_else(|| key.not_found())
    }

    #[instrument(skip(self, record), fields(key = %key, fields = record.data.len()))]
    async fn create(&self, key: &RecordKey, record: &Record) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(key) {
            return Err(key.conflict());
        }
        records.insert(key.clone(), record.clone());
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[instrument(skip(self, record), fields(key = %key, fields = record.data.len()))]
    async fn update(&self, key: &RecordKey, record: &Record) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(key) {
            None => Err(key.not_found()),
            Some(existing) => {
                *existing = record.clone();
                self.counters.updates.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}
