//! Telemetry and logging infrastructure
//!
//! Installs a `tracing` subscriber with an env filter. `RUST_LOG` always wins
//! over the configured level.

use crate::error::{Error, Result};
use crate::log_level::DebugLevel;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "cairn-operator".to_string(),
            log_level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Derive the filter from the ordinal debug setting
    pub fn with_debug_level(self, level: DebugLevel) -> Self {
        self.with_log_level(level.as_filter())
    }

    /// Emit JSON lines
    pub fn with_json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - `RUST_LOG`: log level filter (default: "info")
    /// - `CAIRN_LOG_FORMAT`: "json" for JSON lines, anything else for text
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = match std::env::var("CAIRN_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            log_level,
            format,
            ..Default::default()
        }
    }
}

/// Guard returned by `init_telemetry`; keep it alive for the process lifetime
#[must_use]
pub struct TelemetryGuard {
    _service_name: String,
}

/// Initialize the global tracing subscriber
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    installed.map_err(|e| Error::Internal {
        reason: format!("failed to initialize tracing subscriber: {}", e),
    })?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        _service_name: config.service_name,
    })
}
