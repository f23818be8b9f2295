//! Cairn Operator
//!
//! The pieces of the operator process that sit above the individual crates:
//! - [`reconcile`] - the sequential control cycle (identity, membership, config)
//! - [`driver_gate`] - platform-version gating of optional capability drivers
//!
//! The `cairn-operator` binary wires these to a file-backed store.

pub mod driver_gate;
pub mod reconcile;

pub use driver_gate::{evaluate, DriverGate, GateState, PlatformVersion};
pub use reconcile::{CycleReport, Reconciler};
