//! Node pinning
//!
//! Best-effort record of which node each member was scheduled on, persisted
//! as JSON next to the member directory. A malformed blob degrades to an
//! empty mapping; the cause travels with the result.

use cairn_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node a member is pinned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hostname", default)]
    pub hostname: String,
    #[serde(rename = "Address", default)]
    pub address: String,
}

/// Member name to node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePinning {
    #[serde(rename = "node", default)]
    pub nodes: BTreeMap<String, NodeInfo>,
}

/// Outcome of loading node pinning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinningLoad {
    Ok(NodePinning),
    /// The blob was unusable; `mapping` is empty
    Degraded { mapping: NodePinning, cause: String },
}

impl Default for PinningLoad {
    fn default() -> Self {
        Self::Ok(NodePinning::default())
    }
}

impl PinningLoad {
    pub fn mapping(&self) -> &NodePinning {
        match self {
            Self::Ok(mapping) | Self::Degraded { mapping, .. } => mapping,
        }
    }

    pub fn into_mapping(self) -> NodePinning {
        match self {
            Self::Ok(mapping) | Self::Degraded { mapping, .. } => mapping,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

impl NodePinning {
    /// Parse the persisted blob; absent or blank is an empty mapping
    pub fn load(blob: Option<&str>) -> PinningLoad {
        let text = match blob.map(str::trim) {
            None | Some("") => return PinningLoad::Ok(Self::default()),
            Some(text) => text,
        };
        match serde_json::from_str::<Self>(text) {
            Ok(mapping) => PinningLoad::Ok(mapping),
            Err(e) => PinningLoad::Degraded {
                mapping: Self::default(),
                cause: e.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::internal(format!("failed to encode node pinning: {}", e)))
    }

    pub fn pin(&mut self, member: impl Into<String>, node: NodeInfo) {
        self.nodes.insert(member.into(), node);
    }

    pub fn node_of(&self, member: &str) -> Option<&NodeInfo> {
        self.nodes.get(member)
    }

    /// Drop entries for members that are gone
    pub fn retain_members(&mut self, mut is_member: impl FnMut(&str) -> bool) {
        self.nodes.retain(|name, _| is_member(name));
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_persisted_layout() {
        let blob = r#"{"node":{"a":{"Name":"node1","Hostname":"node1.local","Address":"10.0.0.1"}}}"#;
        let load = NodePinning::load(Some(blob));
        assert!(!load.is_degraded());
        let node = load.mapping().node_of("a").unwrap();
        assert_eq!(node.hostname, "node1.local");
        assert_eq!(load.mapping().to_json().unwrap(), blob);
    }

    #[test]
    fn test_absent_is_empty() {
        assert_eq!(NodePinning::load(None), PinningLoad::Ok(NodePinning::default()));
        assert_eq!(NodePinning::load(Some("  ")), PinningLoad::Ok(NodePinning::default()));
    }

    #[test]
    fn test_malformed_degrades_with_cause() {
        let load = NodePinning::load(Some("{not json"));
        match &load {
            PinningLoad::Degraded { mapping, cause } => {
                assert!(mapping.is_empty());
                assert!(!cause.is_empty());
            }
            other => panic!("expected degraded, got {:?}", other),
        }
    }

    #[test]
    fn test_retain_members() {
        let mut pinning = NodePinning::default();
        let info = NodeInfo {
            name: "n".into(),
            hostname: "n".into(),
            address: "10.0.0.9".into(),
        };
        pinning.pin("a", info.clone());
        pinning.pin("b", info);
        pinning.retain_members(|name| name == "a");
        assert!(pinning.node_of("a").is_some());
        assert!(pinning.node_of("b").is_none());
    }
}
