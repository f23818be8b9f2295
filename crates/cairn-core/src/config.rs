//! Configuration for cairn
//!
//! Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use crate::log_level::DebugLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the operator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Cluster placement and persistence
    #[serde(default)]
    pub cluster: ClusterSettings,

    /// Bind addresses and subnets copied into the rendered config
    #[serde(default)]
    pub network: NetworkSettings,

    /// Operator and daemon log verbosity
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Optional capability drivers
    #[serde(default)]
    pub drivers: DriverSettings,

    /// Externally-managed cluster handling
    #[serde(default)]
    pub external: ExternalSettings,
}

impl OperatorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.network.validate()?;
        self.drivers.validate()?;
        self.external.validate()?;
        Ok(())
    }
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Namespace the cluster's persisted state lives in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Directory rendered config and keyrings are written to
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Root of the file-backed record store
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Whether this process may create a missing cluster identity
    #[serde(default = "default_allow_create")]
    pub allow_create: bool,
}

fn default_namespace() -> String {
    "rook-ceph".to_string()
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/var/lib/cairn/config")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/cairn/state")
}

fn default_allow_create() -> bool {
    true
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            config_dir: default_config_dir(),
            state_dir: default_state_dir(),
            allow_create: default_allow_create(),
        }
    }
}

impl ClusterSettings {
    fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::InvalidConfiguration {
                field: "cluster.namespace".into(),
                reason: "cannot be empty".into(),
            });
        }
        let valid = self
            .namespace
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(Error::InvalidConfiguration {
                field: "cluster.namespace".into(),
                reason: "must be lowercase alphanumeric or '-'".into(),
            });
        }
        Ok(())
    }
}

/// Network configuration copied verbatim into the rendered config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default)]
    pub public_addr: Option<String>,

    #[serde(default)]
    pub public_network: Option<String>,

    #[serde(default)]
    pub cluster_addr: Option<String>,

    #[serde(default)]
    pub cluster_network: Option<String>,
}

impl NetworkSettings {
    fn validate(&self) -> Result<()> {
        for (field, subnet) in [
            ("network.public_network", &self.public_network),
            ("network.cluster_network", &self.cluster_network),
        ] {
            if let Some(subnet) = subnet {
                if !subnet.contains('/') {
                    return Err(Error::InvalidConfiguration {
                        field: field.into(),
                        reason: format!("{:?} is not in CIDR form", subnet),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Ordinal debug setting; also drives the daemons' verbosity
    #[serde(default)]
    pub level: DebugLevel,
}

/// Re-evaluation policy of the capability-driver gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePolicy {
    /// Once closed, stays closed until the process restarts
    #[default]
    Sticky,
    /// Every evaluation reflects the version passed in
    Reevaluate,
}

/// Capability driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSettings {
    #[serde(default = "default_true")]
    pub enable_rbd: bool,

    #[serde(default = "default_true")]
    pub enable_cephfs: bool,

    #[serde(default = "default_min_major")]
    pub min_major: u32,

    #[serde(default = "default_min_minor")]
    pub min_minor: u32,

    #[serde(default)]
    pub gate_policy: GatePolicy,
}

fn default_true() -> bool {
    true
}

fn default_min_major() -> u32 {
    DRIVER_PLATFORM_MAJOR_MIN
}

fn default_min_minor() -> u32 {
    DRIVER_PLATFORM_MINOR_MIN
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            enable_rbd: true,
            enable_cephfs: true,
            min_major: default_min_major(),
            min_minor: default_min_minor(),
            gate_policy: GatePolicy::default(),
        }
    }
}

impl DriverSettings {
    fn validate(&self) -> Result<()> {
        if self.min_major == 0 {
            return Err(Error::InvalidConfiguration {
                field: "drivers.min_major".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// External cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSettings {
    /// Whether the cluster is managed outside this operator
    #[serde(default)]
    pub enabled: bool,

    /// Interval between credential polls (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS
}

impl Default for ExternalSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl ExternalSettings {
    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms < EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS {
            return Err(Error::InvalidConfiguration {
                field: "external.poll_interval_ms".into(),
                reason: format!(
                    "{} is below the minimum {}",
                    self.poll_interval_ms, EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS
                ),
            });
        }
        Ok(())
    }
}
