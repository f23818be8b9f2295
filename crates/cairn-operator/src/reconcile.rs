//! The control cycle
//!
//! One cycle runs sequentially as the single writer of a namespace:
//!
//! 1. load-or-create the cluster identity
//! 2. load membership, allocate members for new addresses, persist
//! 3. build the default config and load the override
//! 4. render the config and keyrings
//!
//! Identity creation completes before any member is allocated. Nothing is
//! carried between cycles; each one reloads from the store.
//!
//! An externally managed cluster runs no cycle. Its imported identity is
//! loaded and the polled credential attached with
//! [`Reconciler::connect_external`].

use cairn_conf::{build_default, load_override, ConfigRenderer};
use cairn_core::{IoContext, OperatorConfig, Result};
use cairn_mon::{
    ClusterIdentity, CredentialPoll, IdentityStore, KeyGenerator, Member, MembershipRegistry,
    PinningLoad,
};
use cairn_store::RecordStore;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// What a cycle did
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub namespace: String,
    pub fsid: String,
    /// Members allocated this cycle
    pub added: Vec<Member>,
    pub member_count: usize,
    pub max_id: Option<u32>,
    pub config_path: PathBuf,
    pub admin_keyring_path: PathBuf,
    pub mon_keyring_path: PathBuf,
    pub override_applied: bool,
    /// Why node pinning was ignored, if it was
    pub pinning_degraded: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Drives identity, membership and config for one namespace
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    identities: IdentityStore,
    renderer: ConfigRenderer,
    config: OperatorConfig,
    io: IoContext,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        keygen: Arc<dyn KeyGenerator>,
        io: IoContext,
        config: OperatorConfig,
    ) -> Self {
        Self {
            identities: IdentityStore::new(store.clone(), keygen, io.clone()),
            renderer: ConfigRenderer::new(config.cluster.config_dir.clone()),
            store,
            config,
            io,
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Run one cycle; `desired_addresses` are the legacy addresses of the
    /// members that should exist
    pub async fn run_cycle(&self, desired_addresses: &[String]) -> Result<CycleReport> {
        let namespace = self.config.cluster.namespace.as_str();
        tracing::info!(namespace = %namespace, desired = desired_addresses.len(), "Starting control cycle");

        let identity = self
            .identities
            .load_or_create(namespace, self.config.cluster.allow_create)
            .await?;

        let mut registry = MembershipRegistry::load(self.store.as_ref(), namespace).await?;
        let mut added = Vec::new();
        for addr in desired_addresses {
            if !registry.has_address(addr) {
                added.push(registry.add_member(addr.clone(), None)?);
            }
        }
        if !added.is_empty() {
            registry.save(self.store.as_ref()).await?;
        }

        let document = build_default(
            &identity,
            &registry,
            &self.config.network,
            self.config.logging.level,
            &self.renderer.admin_keyring_path(),
        );
        let override_doc = load_override(self.store.as_ref(), namespace).await?;

        let config_path = self
            .renderer
            .render(identity.name(), &document, override_doc.as_ref())
            .await?;
        let admin_keyring_path = self.renderer.write_admin_keyring(&identity).await?;
        let mon_keyring_path = self.renderer.write_mon_keyring(&identity).await?;

        let pinning_degraded = match registry.pinning_load() {
            PinningLoad::Degraded { cause, .. } => Some(cause.clone()),
            PinningLoad::Ok(_) => None,
        };
        let completed_at = DateTime::<Utc>::from_timestamp_millis(self.io.now_ms() as i64)
            .unwrap_or_default();

        let report = CycleReport {
            namespace: namespace.to_string(),
            fsid: identity.fsid().to_string(),
            member_count: registry.members().len(),
            max_id: registry.max_id(),
            added,
            config_path,
            admin_keyring_path,
            mon_keyring_path,
            override_applied: override_doc.is_some(),
            pinning_degraded,
            completed_at,
        };
        tracing::info!(
            namespace = %namespace,
            fsid = %report.fsid,
            members = report.member_count,
            added = report.added.len(),
            "Control cycle complete"
        );
        Ok(report)
    }

    /// Load the imported identity of an external cluster and attach its
    /// credential, waiting for the credential until `shutdown` fires
    ///
    /// Never creates an identity; an absent one is `NotFound`.
    pub async fn connect_external(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<ClusterIdentity> {
        let namespace = self.config.cluster.namespace.as_str();
        let identity = self.identities.load(namespace).await?;

        let mut poll = CredentialPoll::new(self.store.clone(), self.io.time.clone(), namespace)
            .with_interval_ms(self.config.external.poll_interval_ms);
        let credential = poll.resolve(shutdown).await?;
        tracing::info!(
            namespace = %namespace,
            fsid = %identity.fsid(),
            username = %credential.username(),
            admin = credential.is_admin(),
            polls = poll.polls(),
            "Attached external cluster credentials"
        );
        Ok(identity.with_external_credential(credential))
    }
}
