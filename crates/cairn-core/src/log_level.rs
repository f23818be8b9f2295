//! Ordinal debug setting and its daemon verbosity mapping
//!
//! The operator's own log level is an ordinal from informational (0) to
//! debug (`DebugLevel::MAX`). The storage daemons take a numeric verbosity;
//! the two fixed points are informational = 0 and debug = `LOG_VERBOSITY_MAX`,
//! with linear interpolation in between.

use crate::constants::LOG_VERBOSITY_MAX;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal debug setting, 0 (informational) through `DebugLevel::MAX` (debug)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DebugLevel(u8);

impl DebugLevel {
    /// Highest ordinal
    pub const MAX: u8 = 5;

    /// Informational logging
    pub const INFO: DebugLevel = DebugLevel(0);

    /// Full debug logging
    pub const DEBUG: DebugLevel = DebugLevel(Self::MAX);

    /// Create a level, rejecting ordinals above `MAX`
    pub fn new(ordinal: u8) -> Result<Self> {
        if ordinal > Self::MAX {
            return Err(Error::InvalidConfiguration {
                field: "logging.level".into(),
                reason: format!("{} exceeds maximum {}", ordinal, Self::MAX),
            });
        }
        Ok(Self(ordinal))
    }

    /// Ordinal value
    pub fn ordinal(self) -> u8 {
        self.0
    }

    /// Daemon verbosity for this level
    pub fn verbosity(self) -> u32 {
        let max = u32::from(Self::MAX);
        // Round to nearest so every ordinal lands on the line through both fixed points
        (u32::from(self.0) * LOG_VERBOSITY_MAX + max / 2) / max
    }

    /// The matching filter directive for the operator's own tracing subscriber
    pub fn as_filter(self) -> &'static str {
        if self == Self::INFO {
            "info"
        } else {
            "debug"
        }
    }
}

impl Default for DebugLevel {
    fn default() -> Self {
        Self::INFO
    }
}

impl From<tracing::Level> for DebugLevel {
    fn from(level: tracing::Level) -> Self {
        // Levels quieter than info clamp to info, louder than debug clamp to debug
        if level >= tracing::Level::DEBUG {
            Self::DEBUG
        } else {
            Self::INFO
        }
    }
}

impl TryFrom<u8> for DebugLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DebugLevel> for u8 {
    fn from(level: DebugLevel) -> Self {
        level.0
    }
}

impl FromStr for DebugLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::INFO),
            "debug" => Ok(Self::DEBUG),
            other => {
                let ordinal: u8 = other
                    .parse()
                    .map_err(|_| Error::parse("logging.level", format!("unknown level {:?}", s)))?;
                Self::new(ordinal)
            }
        }
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INFO => write!(f, "info"),
            Self::DEBUG => write!(f, "debug"),
            Self(n) => write!(f, "{}", n),
        }
    }
}
