//! Cairn Core
//!
//! Core types, errors, and constants for the cairn storage-cluster control plane.
//!
//! # Overview
//!
//! Cairn establishes and persists the identity of a distributed storage cluster,
//! allocates IDs for its quorum members, and synthesizes the runtime
//! configuration the cluster's daemons consume. This crate holds what every
//! other crate shares:
//! - [`error`] - the error taxonomy and `Result` alias
//! - [`config`] - operator configuration with explicit validation
//! - [`io`] - time and randomness abstractions (production vs. simulation)
//! - [`log_level`] - the ordinal debug setting and its verbosity mapping
//! - [`telemetry`] - tracing subscriber initialization
//!
//! # Conventions
//!
//! - Explicit limits with big-endian naming and units (e.g. `MON_PORT_LEGACY`)
//! - All external I/O goes through traits so tests can run in simulated time

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod log_level;
pub mod telemetry;

pub use config::{
    ClusterSettings, DriverSettings, ExternalSettings, GatePolicy, LoggingSettings,
    NetworkSettings, OperatorConfig,
};
pub use constants::*;
pub use error::{Error, Result};
pub use io::{IoContext, RngProvider, StdRngProvider, TimeProvider, WallClockTime};
pub use log_level::DebugLevel;
pub use telemetry::{init_telemetry, LogFormat, TelemetryConfig, TelemetryGuard};
