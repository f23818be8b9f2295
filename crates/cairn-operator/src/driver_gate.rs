//! Capability driver eligibility
//!
//! Optional storage-access drivers need a minimum platform version. The gate
//! holds an explicit [`GateState`]; with [`GatePolicy::Sticky`] a closed gate
//! never reopens in this process, even if a later evaluation sees a newer
//! platform. Operators restart the process to re-enable drivers.

use cairn_core::{DriverSettings, Error, GatePolicy, Result};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Whether optional drivers may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Open,
    Closed,
}

impl GateState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closed => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        if value == 0 {
            Self::Open
        } else {
            Self::Closed
        }
    }
}

/// Platform major/minor version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
}

impl PlatformVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse version components as reported by the platform
    ///
    /// Trailing vendor suffixes are ignored, so `"13+"` reads as 13.
    pub fn parse(major: &str, minor: &str) -> Result<Self> {
        Ok(Self {
            major: leading_number("major", major)?,
            minor: leading_number("minor", minor)?,
        })
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn leading_number(field: &str, text: &str) -> Result<u32> {
    let text = text.trim();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end]
        .parse()
        .map_err(|e| Error::parse(field, format!("{:?}: {}", text, e)))
}

/// Whether `major.minor` meets the `min_major.min_minor` floor
pub fn evaluate(major: u32, minor: u32, min_major: u32, min_minor: u32) -> bool {
    !(major < min_major || (major == min_major && minor < min_minor))
}

/// Version gate for optional drivers
#[derive(Debug)]
pub struct DriverGate {
    policy: GatePolicy,
    min: PlatformVersion,
    enable_rbd: bool,
    enable_cephfs: bool,
    state: AtomicU8,
}

impl DriverGate {
    pub fn new(policy: GatePolicy, min: PlatformVersion) -> Self {
        Self {
            policy,
            min,
            enable_rbd: true,
            enable_cephfs: true,
            state: AtomicU8::new(GateState::Open.as_u8()),
        }
    }

    pub fn from_settings(settings: &DriverSettings) -> Self {
        Self {
            enable_rbd: settings.enable_rbd,
            enable_cephfs: settings.enable_cephfs,
            ..Self::new(
                settings.gate_policy,
                PlatformVersion::new(settings.min_major, settings.min_minor),
            )
        }
    }

    pub fn state(&self) -> GateState {
        GateState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Evaluate `version` under the gate's policy and return the new state
    pub fn check(&self, version: PlatformVersion) -> GateState {
        let supported = evaluate(version.major, version.minor, self.min.major, self.min.minor);
        let next = match (self.policy, supported) {
            (_, false) => GateState::Closed,
            (GatePolicy::Sticky, true) => self.state(),
            (GatePolicy::Reevaluate, true) => GateState::Open,
        };

        let previous = GateState::from_u8(self.state.swap(next.as_u8(), Ordering::SeqCst));
        if previous != next {
            tracing::info!(
                version = %version,
                minimum = %self.min,
                policy = ?self.policy,
                state = ?next,
                "Driver gate changed state"
            );
        } else if next == GateState::Closed && supported {
            tracing::debug!(version = %version, "Driver gate stays closed until restart");
        }
        next
    }

    pub fn rbd_enabled(&self) -> bool {
        self.enable_rbd && self.state() == GateState::Open
    }

    pub fn cephfs_enabled(&self) -> bool {
        self.enable_cephfs && self.state() == GateState::Open
    }
}
