//! Simulated key generator
//!
//! Produces keys from the simulation RNG instead of an external tool, and
//! fails when the injector fires `KeyGenerationFail` on `keygen`.

use crate::fault::{FaultInjector, FaultType};
use crate::rng::DeterministicRng;
use async_trait::async_trait;
use cairn_core::{Error, Result};
use cairn_mon::{Capability, KeyGenerator};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const OP_KEYGEN: &str = "keygen";

#[derive(Debug, Clone)]
pub struct SimKeyGenerator {
    rng: DeterministicRng,
    faults: Arc<FaultInjector>,
    calls: Arc<AtomicU64>,
}

impl SimKeyGenerator {
    pub fn new(rng: DeterministicRng, faults: Arc<FaultInjector>) -> Self {
        Self {
            rng,
            faults,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Calls made, including failed ones
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyGenerator for SimKeyGenerator {
    async fn generate_key(&self, entity: &str, caps: &[Capability]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(FaultType::KeyGenerationFail) = self.faults.should_inject(OP_KEYGEN) {
            return Err(Error::KeyGeneration {
                entity: entity.to_string(),
                reason: "injected key generation failure".into(),
            });
        }

        let key = format!("AQ{:016x}{:016x}==", self.rng.next_u64(), self.rng.next_u64());
        tracing::debug!(entity = %entity, caps = caps.len(), "Generated simulated key");
        Ok(key)
    }
}
