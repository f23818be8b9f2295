//! Record types and the store trait
//!
//! Explicit operations, no transactions.

use async_trait::async_trait;
use bytes::Bytes;
use cairn_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Secret material (identity, credentials)
    Secret,
    /// Plain configuration (member directory, overrides)
    Config,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of a record: namespace, kind and name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub namespace: String,
    pub kind: RecordKind,
    pub name: String,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, kind: RecordKind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for a secret record
    pub fn secret(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, RecordKind::Secret, name)
    }

    /// Shorthand for a config record
    pub fn config(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, RecordKind::Config, name)
    }

    /// The `NotFound` error for this key
    pub fn not_found(&self) -> Error {
        Error::not_found(self.kind.as_str(), &self.namespace, &self.name)
    }

    /// The `Conflict` error for this key
    pub fn conflict(&self) -> Error {
        Error::conflict(self.kind.as_str(), &self.namespace, &self.name)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A persisted record: named byte-string fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub data: BTreeMap<String, Bytes>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Bytes>) {
        self.data.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Bytes> {
        self.data.get(field)
    }

    /// Field as UTF-8 text; `None` when absent
    pub fn get_str(&self, field: &str) -> Result<Option<&str>> {
        match self.data.get(field) {
            None => Ok(None),
            Some(bytes) => std::str::from_utf8(bytes)
                .map(Some)
                .map_err(|e| Error::parse(field, format!("not valid UTF-8: {}", e))),
        }
    }

    /// Field as UTF-8 text, `Parse` error when absent
    pub fn require_str(&self, field: &str) -> Result<&str> {
        self.get_str(field)?
            .ok_or_else(|| Error::parse(field, "missing required field"))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Persisted record store
///
/// Assumed safe for concurrent use by independent tasks. `create` is the only
/// atomic primitive; two racing creators see exactly one success.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a record, `NotFound` when absent
    async fn get(&self, key: &RecordKey) -> Result<Record>;

    /// Create a record, `Conflict` when it already exists
    async fn create(&self, key: &RecordKey, record: &Record) -> Result<()>;

    /// Replace an existing record, `NotFound` when absent
    async fn update(&self, key: &RecordKey, record: &Record) -> Result<()>;

    /// Get a record, mapping `NotFound` to `None`
    async fn get_optional(&self, key: &RecordKey) -> Result<Option<Record>> {
        match self.get(key).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Update a record, creating it when absent
    async fn upsert(&self, key: &RecordKey, record: &Record) -> Result<()> {
        match self.update(key, record).await {
            Err(e) if e.is_not_found() => self.create(key, record).await,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fields() {
        let record = Record::new()
            .with("fsid", "4f1c")
            .with("binary", vec![0xffu8, 0xfe]);

        assert_eq!(record.get_str("fsid").unwrap(), Some("4f1c"));
        assert_eq!(record.get_str("missing").unwrap(), None);
        assert!(record.get_str("binary").is_err());
        assert!(record.require_str("missing").is_err());
    }

    #[test]
    fn test_key_errors() {
        let key = RecordKey::secret("rook-ceph", "rook-ceph-mon");
        assert!(key.not_found().is_not_found());
        assert!(key.conflict().is_conflict());
        assert_eq!(key.to_string(), "secret/rook-ceph/rook-ceph-mon");
    }
}
