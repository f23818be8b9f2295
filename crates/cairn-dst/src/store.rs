//! Simulated record store
//!
//! Wraps [`MemoryStore`] and consults the shared [`FaultInjector`] before
//! every operation. Operation names are `store_read`, `store_write_create`
//! and `store_write_update`, so filters can target reads or writes.

use crate::fault::{FaultInjector, FaultType};
use crate::rng::DeterministicRng;
use async_trait::async_trait;
use cairn_core::{Error, Result, TimeProvider};
use cairn_store::{MemoryStore, Record, RecordKey, RecordStore};
use std::sync::Arc;

const OP_READ: &str = "store_read";
const OP_CREATE: &str = "store_write_create";
const OP_UPDATE: &str = "store_write_update";

/// What to do with a write once the injector has spoken
enum WritePlan {
    Proceed,
    Fail(Error),
    CrashAfter,
}

#[derive(Debug, Clone)]
pub struct SimStore {
    inner: MemoryStore,
    faults: Arc<FaultInjector>,
    rng: DeterministicRng,
    time: Arc<dyn TimeProvider>,
}

impl SimStore {
    pub fn new(
        rng: DeterministicRng,
        faults: Arc<FaultInjector>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            inner: MemoryStore::new(),
            faults,
            rng,
            time,
        }
    }

    /// The fault-free store underneath, for seeding state and checking
    /// what was actually persisted
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    async fn delay(&self, min_ms: u64, max_ms: u64) {
        let delay_ms = if max_ms > min_ms {
            self.rng.next_range(min_ms, max_ms + 1)
        } else {
            min_ms
        };
        self.time.sleep_ms(delay_ms).await;
    }

    async fn plan_write(&self, operation: &str, key: &RecordKey) -> WritePlan {
        match self.faults.should_inject(operation) {
            Some(FaultType::StorageWriteFail) => WritePlan::Fail(Error::StorageWriteFailed {
                key: key.to_string(),
                reason: "injected write failure".into(),
            }),
            Some(FaultType::CrashAfterWrite) => WritePlan::CrashAfter,
            Some(FaultType::StorageLatency { min_ms, max_ms }) => {
                self.delay(min_ms, max_ms).await;
                WritePlan::Proceed
            }
            _ => WritePlan::Proceed,
        }
    }

    fn crashed(key: &RecordKey) -> Error {
        Error::StorageWriteFailed {
            key: key.to_string(),
            reason: "injected crash after write".into(),
        }
    }
}

#[async_trait]
impl RecordStore for SimStore {
    async fn get(&self, key: &RecordKey) -> Result<Record> {
        match self.faults.should_inject(OP_READ) {
            Some(FaultType::StorageReadFail) => {
                return Err(Error::StorageReadFailed {
                    key: key.to_string(),
                    reason: "injected read failure".into(),
                })
            }
            Some(FaultType::StorageLatency { min_ms, max_ms }) => {
                self.delay(min_ms, max_ms).await
            }
            _ => {}
        }
        self.inner.get(key).await
    }

    async fn create(&self, key: &RecordKey, record: &Record) -> Result<()> {
        match self.plan_write(OP_CREATE, key).await {
            WritePlan::Fail(e) => Err(e),
            WritePlan::Proceed => self.inner.create(key, record).await,
            WritePlan::CrashAfter => {
                self.inner.create(key, record).await?;
                Err(Self::crashed(key))
            }
        }
    }

    async fn update(&self, key: &RecordKey, record: &Record) -> Result<()> {
        match self.plan_write(OP_UPDATE, key).await {
            WritePlan::Fail(e) => Err(e),
            WritePlan::Proceed => self.inner.update(key, record).await,
            WritePlan::CrashAfter => {
                self.inner.update(key, record).await?;
                Err(Self::crashed(key))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::fault::{FaultConfig, FaultInjectorBuilder};
    use crate::time::SimTime;

    fn store(faults: Vec<FaultConfig>) -> (SimStore, Arc<SimClock>) {
        let rng = DeterministicRng::new(42);
        let mut builder = FaultInjectorBuilder::new(rng.fork());
        for fault in faults {
            builder = builder.with_fault(fault);
        }
        let clock = Arc::new(SimClock::from_millis(0));
        let time = Arc::new(SimTime::new(clock.clone()));
        (SimStore::new(rng, Arc::new(builder.build()), time), clock)
    }

    fn key() -> RecordKey {
        RecordKey::config("ns", "thing")
    }

    #[tokio::test]
    async fn test_passthrough_without_faults() {
        let (store, _) = store(vec![]);
        store.create(&key(), &Record::new().with("a", "1")).await.unwrap();
        assert_eq!(store.get(&key()).await.unwrap().require_str("a").unwrap(), "1");
        assert!(store.create(&key(), &Record::new()).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_write_failure_persists_nothing() {
        let (store, _) = store(vec![FaultConfig::new(FaultType::StorageWriteFail, 1.0)]);
        let err = store.create(&key(), &Record::new()).await.unwrap_err();
        assert!(matches!(err, Error::StorageWriteFailed { .. }));
        assert!(store.inner().is_empty().await);
    }

    #[tokio::test]
    async fn test_crash_after_write_persists() {
        let (store, _) = store(vec![FaultConfig::new(FaultType::CrashAfterWrite, 1.0)]);
        let err = store.create(&key(), &Record::new()).await.unwrap_err();
        assert!(matches!(err, Error::StorageWriteFailed { .. }));
        assert_eq!(store.inner().len().await, 1);
    }

    #[tokio::test]
    async fn test_read_failure_is_not_not_found() {
        let (store, _) = store(vec![
            FaultConfig::new(FaultType::StorageReadFail, 1.0).with_filter("store_read")
        ]);
        let err = store.get(&key()).await.unwrap_err();
        assert!(matches!(err, Error::StorageReadFailed { .. }));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_latency_advances_simulated_time() {
        let (store, clock) = store(vec![FaultConfig::new(
            FaultType::StorageLatency {
                min_ms: 50,
                max_ms: 50,
            },
            1.0,
        )]);
        assert!(store.get(&key()).await.unwrap_err().is_not_found());
        assert_eq!(clock.now_ms(), 50);
    }
}
