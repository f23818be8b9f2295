//! Simulation harness
//!
//! Builds a seeded environment (clock, RNG, faulty store, key generator)
//! and runs a test body against it on the caller's runtime. Task
//! interleaving is tokio's; only time, randomness and faults are seeded.

use crate::clock::SimClock;
use crate::fault::{FaultConfig, FaultInjector, FaultInjectorBuilder};
use crate::keygen::SimKeyGenerator;
use crate::rng::DeterministicRng;
use crate::store::SimStore;
use crate::time::SimTime;
use cairn_core::{IoContext, RngProvider, TimeProvider};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    /// Simulated start time, ms since epoch
    pub start_ms: u64,
}

impl SimConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_ms: SimClock::default().now_ms(),
        }
    }

    /// Seed from `DST_SEED`, or pick one at random and log it
    pub fn from_env_or_random() -> Self {
        Self::new(DeterministicRng::from_env_or_random().seed())
    }

    pub fn with_start_ms(mut self, ms: u64) -> Self {
        self.start_ms = ms;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Everything a simulated test talks to
pub struct SimEnvironment {
    pub clock: Arc<SimClock>,
    pub rng: Arc<DeterministicRng>,
    /// Auto-advancing time and seeded RNG, for code under test
    pub io: IoContext,
    pub store: SimStore,
    pub keygen: SimKeyGenerator,
    pub faults: Arc<FaultInjector>,
}

impl SimEnvironment {
    pub fn fork_rng(&self) -> DeterministicRng {
        self.rng.fork()
    }

    pub fn advance_time_ms(&self, ms: u64) {
        self.clock.advance_ms(ms);
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

pub struct Simulation {
    config: SimConfig,
    fault_configs: Vec<FaultConfig>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            fault_configs: Vec::new(),
        }
    }

    pub fn with_fault(mut self, fault: FaultConfig) -> Self {
        self.fault_configs.push(fault);
        self
    }

    pub fn with_faults(mut self, faults: Vec<FaultConfig>) -> Self {
        self.fault_configs.extend(faults);
        self
    }

    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    fn environment(self) -> SimEnvironment {
        let rng = Arc::new(DeterministicRng::new(self.config.seed));
        let clock = Arc::new(SimClock::from_millis(self.config.start_ms));

        let mut builder = FaultInjectorBuilder::new(rng.fork());
        for fault in self.fault_configs {
            builder = builder.with_fault(fault);
        }
        let faults = Arc::new(builder.build());

        let time: Arc<dyn TimeProvider> = Arc::new(SimTime::new(clock.clone()));
        let io = IoContext::new(time.clone(), rng.clone() as Arc<dyn RngProvider>);
        let store = SimStore::new(rng.fork(), faults.clone(), time);
        let keygen = SimKeyGenerator::new(rng.fork(), faults.clone());

        SimEnvironment {
            clock,
            rng,
            io,
            store,
            keygen,
            faults,
        }
    }

    /// Run `test` on a fresh current-thread runtime
    pub fn run<F, Fut, T>(self, test: F) -> Result<T, SimulationError>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = cairn_core::Result<T>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SimulationError::RuntimeError(e.to_string()))?;
        runtime.block_on(self.run_async(test))
    }

    /// Run `test` inside an existing runtime
    pub async fn run_async<F, Fut, T>(self, test: F) -> Result<T, SimulationError>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = cairn_core::Result<T>>,
    {
        let seed = self.config.seed;
        let env = self.environment();
        let faults = env.faults.clone();

        let result = test(env).await;
        tracing::info!(
            seed = seed,
            operations = faults.operation_count(),
            injected = faults.total_triggers(),
            ok = result.is_ok(),
            "Simulation finished"
        );
        result.map_err(|e| SimulationError::TestFailed { seed, error: e })
    }
}

#[derive(Debug)]
pub enum SimulationError {
    /// Test body returned an error; `seed` replays it
    TestFailed { seed: u64, error: cairn_core::Error },
    RuntimeError(String),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::TestFailed { seed, error } => {
                write!(f, "Test failed (DST_SEED={}): {}", seed, error)
            }
            SimulationError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {}
