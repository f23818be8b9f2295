//! Cairn operator
//!
//! Runs one control cycle against a file-backed store, then optionally waits
//! for external cluster credentials until they appear or Ctrl-C arrives.

use anyhow::{Context, Result};
use cairn_core::{init_telemetry, DebugLevel, Error, IoContext, OperatorConfig, TelemetryConfig};
use cairn_mon::AuthtoolKeyGenerator;
use cairn_operator::{DriverGate, GateState, PlatformVersion, Reconciler};
use cairn_store::{FileStore, RecordStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Cairn operator CLI
#[derive(Parser, Debug)]
#[command(name = "cairn-operator")]
#[command(about = "Storage cluster identity, membership and config control plane")]
#[command(version)]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(short, long, env = "CAIRN_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace holding the cluster's persisted state
    #[arg(short, long, env = "CAIRN_NAMESPACE")]
    namespace: Option<String>,

    /// Directory the rendered config and keyrings are written to
    #[arg(long, env = "CAIRN_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Root of the file-backed record store
    #[arg(long, env = "CAIRN_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Never create a missing cluster identity
    #[arg(long, env = "CAIRN_READ_ONLY")]
    read_only: bool,

    /// Legacy addresses of the quorum members that should exist
    #[arg(long = "mon-addr", env = "CAIRN_MON_ADDRS", value_delimiter = ',')]
    mon_addrs: Vec<String>,

    #[arg(long, env = "CAIRN_PUBLIC_ADDR")]
    public_addr: Option<String>,

    #[arg(long, env = "CAIRN_PUBLIC_NETWORK")]
    public_network: Option<String>,

    #[arg(long, env = "CAIRN_CLUSTER_ADDR")]
    cluster_addr: Option<String>,

    #[arg(long, env = "CAIRN_CLUSTER_NETWORK")]
    cluster_network: Option<String>,

    /// Debug ordinal, 0 (info) to 5 (debug)
    #[arg(long, env = "CAIRN_LOG_LEVEL")]
    log_level: Option<DebugLevel>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// The cluster is managed externally; wait for its credentials
    #[arg(long, env = "CAIRN_EXTERNAL")]
    external: bool,

    /// Platform version as "major.minor", for the driver gate
    #[arg(long, env = "CAIRN_PLATFORM_VERSION")]
    platform_version: Option<String>,
}

impl Cli {
    fn operator_config(&self) -> Result<OperatorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => OperatorConfig::default(),
        };

        if let Some(namespace) = &self.namespace {
            config.cluster.namespace = namespace.clone();
        }
        if let Some(dir) = &self.config_dir {
            config.cluster.config_dir = dir.clone();
        }
        if let Some(dir) = &self.state_dir {
            config.cluster.state_dir = dir.clone();
        }
        if self.read_only {
            config.cluster.allow_create = false;
        }
        for (target, flag) in [
            (&mut config.network.public_addr, &self.public_addr),
            (&mut config.network.public_network, &self.public_network),
            (&mut config.network.cluster_addr, &self.cluster_addr),
            (&mut config.network.cluster_network, &self.cluster_network),
        ] {
            if flag.is_some() {
                *target = flag.clone();
            }
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.external {
            config.external.enabled = true;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.operator_config()?;

    // RUST_LOG still wins inside init_telemetry
    let mut telemetry = TelemetryConfig::from_env().with_debug_level(config.logging.level);
    if cli.json_logs {
        telemetry = telemetry.with_json();
    }
    let _telemetry = init_telemetry(telemetry).context("Failed to initialize telemetry")?;

    tracing::info!(
        namespace = %config.cluster.namespace,
        state_dir = %config.cluster.state_dir.display(),
        config_dir = %config.cluster.config_dir.display(),
        "Cairn operator starting"
    );

    if let Some(version) = &cli.platform_version {
        let (major, minor) = version
            .split_once('.')
            .with_context(|| format!("Platform version {:?} is not major.minor", version))?;
        let version = PlatformVersion::parse(major, minor)?;
        let gate = DriverGate::from_settings(&config.drivers);
        let state = gate.check(version);
        tracing::info!(
            version = %version,
            rbd = gate.rbd_enabled(),
            cephfs = gate.cephfs_enabled(),
            "Driver gate {}",
            if state == GateState::Open { "open" } else { "closed" }
        );
    }

    let store: Arc<dyn RecordStore> = Arc::new(FileStore::new(&config.cluster.state_dir));
    let io = IoContext::production();

    let keygen = Arc::new(AuthtoolKeyGenerator::new(config.cluster.state_dir.join("keygen")));
    let external = config.external.enabled;
    let reconciler = Reconciler::new(store, keygen, io, config);

    if external {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
        });

        match reconciler.connect_external(shutdown_rx).await {
            Ok(identity) => tracing::info!(
                fsid = %identity.fsid(),
                admin = identity.external_credential().is_some_and(|c| c.is_admin()),
                "Connected to external cluster"
            ),
            Err(Error::Cancelled { .. }) => {
                tracing::info!("Stopped before external credentials appeared")
            }
            Err(e) => return Err(e).context("External cluster connection failed"),
        }
        return Ok(());
    }

    let report = tokio::select! {
        report = reconciler.run_cycle(&cli.mon_addrs) => report.context("Control cycle failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested during control cycle");
            return Ok(());
        }
    };

    tracing::info!(
        fsid = %report.fsid,
        members = report.member_count,
        config = %report.config_path.display(),
        "Cluster config rendered"
    );
    Ok(())
}
