//! Cairn Store
//!
//! The external key-value store the control plane persists its state in.
//!
//! # Overview
//!
//! The store offers exactly three primitives per record, with no transactions:
//! - `create` - atomic create-if-absent, `Conflict` when the record exists
//! - `get` - `NotFound` when absent
//! - `update` - whole-record replace, `NotFound` when absent
//!
//! Backends:
//! - [`MemoryStore`] - in-memory (tests and simulation)
//! - [`FileStore`] - one JSON file per record under a root directory

pub mod file;
pub mod memory;
pub mod record;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::{Record, RecordKey, RecordKind, RecordStore};
