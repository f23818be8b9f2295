//! Fault injection for deterministic testing
//!
//! Faults are registered with a probability and optional filters; every
//! simulated operation asks [`FaultInjector::should_inject`] with its
//! operation name (`store_read`, `store_write_create`, `keygen`, ...).

use crate::rng::DeterministicRng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Types of faults the simulated components understand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultType {
    // Record store faults
    /// Read returns `StorageReadFailed`
    StorageReadFail,
    /// Write is rejected with `StorageWriteFailed`, nothing persisted
    StorageWriteFail,
    /// Operation is delayed on the simulated clock, then proceeds
    StorageLatency { min_ms: u64, max_ms: u64 },
    /// Write is persisted, then the caller sees `StorageWriteFailed`
    CrashAfterWrite,

    // Key generation faults
    /// Key generator exits with an error
    KeyGenerationFail,
}

impl FaultType {
    pub fn name(&self) -> &'static str {
        match self {
            FaultType::StorageReadFail => "storage_read_fail",
            FaultType::StorageWriteFail => "storage_write_fail",
            FaultType::StorageLatency { .. } => "storage_latency",
            FaultType::CrashAfterWrite => "crash_after_write",
            FaultType::KeyGenerationFail => "key_generation_fail",
        }
    }
}

/// Configuration for one registered fault
#[derive(Debug, Clone)]
pub struct FaultConfig {
    pub fault_type: FaultType,
    /// Probability of injection per matching operation, in [0, 1]
    pub probability: f64,
    /// Only operations whose name contains this string are eligible
    pub operation_filter: Option<String>,
    /// Skip the first N operations seen by the injector
    pub after_operations: u64,
    pub max_triggers: Option<u64>,
    pub enabled: bool,
}

impl FaultConfig {
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1]"
        );

        Self {
            fault_type,
            probability,
            operation_filter: None,
            after_operations: 0,
            max_triggers: None,
            enabled: true,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    pub fn after(mut self, operations: u64) -> Self {
        self.after_operations = operations;
        self
    }

    pub fn max_triggers(mut self, max: u64) -> Self {
        self.max_triggers = Some(max);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug)]
struct FaultState {
    config: FaultConfig,
    trigger_count: AtomicU64,
}

/// Decides, deterministically from its RNG, which operations fail
#[derive(Debug)]
pub struct FaultInjector {
    faults: Vec<FaultState>,
    rng: DeterministicRng,
    operation_count: AtomicU64,
}

impl FaultInjector {
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            faults: Vec::new(),
            rng,
            operation_count: AtomicU64::new(0),
        }
    }

    pub fn register(&mut self, config: FaultConfig) {
        self.faults.push(FaultState {
            config,
            trigger_count: AtomicU64::new(0),
        });
    }

    /// The first registered fault that fires for `operation`, if any
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        let op_count = self.operation_count.fetch_add(1, Ordering::SeqCst);

        for state in &self.faults {
            let config = &state.config;
            if !config.enabled || op_count < config.after_operations {
                continue;
            }
            if let Some(filter) = &config.operation_filter {
                if !operation.contains(filter.as_str()) {
                    continue;
                }
            }

            let trigger_count = state.trigger_count.load(Ordering::SeqCst);
            if config.max_triggers.is_some_and(|max| trigger_count >= max) {
                continue;
            }

            if self.rng.next_bool(config.probability) {
                state.trigger_count.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    fault = config.fault_type.name(),
                    operation = operation,
                    trigger_count = trigger_count + 1,
                    "Injecting fault"
                );
                return Some(config.fault_type.clone());
            }
        }

        None
    }

    pub fn operation_count(&self) -> u64 {
        self.operation_count.load(Ordering::SeqCst)
    }

    /// Total injections across all registered faults
    pub fn total_triggers(&self) -> u64 {
        self.faults
            .iter()
            .map(|state| state.trigger_count.load(Ordering::SeqCst))
            .sum()
    }

    pub fn stats(&self) -> Vec<FaultStats> {
        self.faults
            .iter()
            .map(|state| FaultStats {
                fault_type: state.config.fault_type.name(),
                probability: state.config.probability,
                trigger_count: state.trigger_count.load(Ordering::SeqCst),
                enabled: state.config.enabled,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FaultStats {
    pub fault_type: &'static str,
    pub probability: f64,
    pub trigger_count: u64,
    pub enabled: bool,
}

pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    faults: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            faults: Vec::new(),
        }
    }

    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.faults.push(config);
        self
    }

    /// Read failures on store reads, write failures on store writes
    pub fn with_storage_faults(self, probability: f64) -> Self {
        self.with_fault(
            FaultConfig::new(FaultType::StorageWriteFail, probability).with_filter("store_write"),
        )
        .with_fault(FaultConfig::new(FaultType::StorageReadFail, probability).with_filter("store_read"))
    }

    pub fn build(self) -> FaultInjector {
        let mut injector = FaultInjector::new(self.rng);
        for config in self.faults {
            injector.register(config);
        }
        injector
    }
}
