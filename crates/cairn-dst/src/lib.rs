//! Cairn DST - Deterministic Simulation Testing
//!
//! Seeded time, randomness and faults for exercising the control plane.
//!
//! # Overview
//!
//! - [`SimClock`] - manually advanced clock; sleepers wait for `advance_ms`
//! - [`SimTime`] - auto-advancing time for code that sleeps between retries
//! - [`DeterministicRng`] - ChaCha20, seeded from `DST_SEED`
//! - [`FaultInjector`] - probabilistic, filterable faults
//! - [`SimStore`] / [`SimKeyGenerator`] - fault-aware stand-ins for the
//!   record store and the external key tool
//!
//! # Example
//!
//! ```rust,ignore
//! use cairn_dst::{FaultConfig, FaultType, SimConfig, Simulation};
//!
//! #[test]
//! fn test_with_faults() {
//!     Simulation::new(SimConfig::from_env_or_random())
//!         .with_fault(FaultConfig::new(FaultType::StorageWriteFail, 0.1))
//!         .run(|env| async move {
//!             // env.store, env.keygen, env.io, env.clock
//!             Ok(())
//!         })
//!         .unwrap();
//! }
//! ```
//!
//! The seed is always logged; a failure prints it too.

pub mod clock;
pub mod fault;
pub mod keygen;
pub mod rng;
pub mod simulation;
pub mod store;
pub mod time;

pub use clock::SimClock;
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultStats, FaultType};
pub use keygen::SimKeyGenerator;
pub use rng::DeterministicRng;
pub use simulation::{SimConfig, SimEnvironment, Simulation, SimulationError};
pub use store::SimStore;
pub use time::SimTime;
