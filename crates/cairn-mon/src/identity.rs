//! Cluster identity
//!
//! The identity is created once per namespace and never regenerated in place.
//! Creation relies on the store's atomic create-if-absent: a writer that loses
//! the race re-loads the winner's identity instead of retrying.

use crate::external::ExternalCredential;
use crate::keyring::{KeyGenerator, ADMIN_CAPS, MON_CAPS};
use cairn_core::{Error, IoContext, Result, ADMIN_SECRET_PLACEHOLDER, ADMIN_USERNAME};
use cairn_core::{IDENTITY_RECORD_NAME, MON_ENTITY_NAME};
use cairn_store::{Record, RecordKey, RecordStore};
use std::fmt;
use std::sync::Arc;

const FIELD_CLUSTER_NAME: &str = "clusterName";
const FIELD_FSID: &str = "fsid";
const FIELD_QUORUM_SECRET: &str = "quorumSecret";
const FIELD_ADMIN_SECRET: &str = "adminSecret";

/// Identity of a storage cluster
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    name: String,
    fsid: String,
    quorum_secret: String,
    admin_secret: String,
    external: Option<ExternalCredential>,
}

impl ClusterIdentity {
    pub fn new(
        name: impl Into<String>,
        fsid: impl Into<String>,
        quorum_secret: impl Into<String>,
        admin_secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            fsid: fsid.into(),
            quorum_secret: quorum_secret.into(),
            admin_secret: admin_secret.into(),
            external: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cluster's 128-bit unique ID in text form
    pub fn fsid(&self) -> &str {
        &self.fsid
    }

    pub fn quorum_secret(&self) -> &str {
        &self.quorum_secret
    }

    pub fn admin_secret(&self) -> &str {
        &self.admin_secret
    }

    /// Credential resolved for an externally-managed cluster, if any
    pub fn external_credential(&self) -> Option<&ExternalCredential> {
        self.external.as_ref()
    }

    pub fn with_external_credential(mut self, credential: ExternalCredential) -> Self {
        self.external = Some(credential);
        self
    }

    /// Whether the admin secret is a real key rather than the export placeholder
    pub fn has_admin_secret(&self) -> bool {
        self.admin_secret != ADMIN_SECRET_PLACEHOLDER
    }

    /// Username clients authenticate as
    pub fn admin_username(&self) -> &'static str {
        ADMIN_USERNAME
    }

    pub fn to_record(&self) -> Record {
        Record::new()
            .with(FIELD_CLUSTER_NAME, self.name.clone())
            .with(FIELD_FSID, self.fsid.clone())
            .with(FIELD_QUORUM_SECRET, self.quorum_secret.clone())
            .with(FIELD_ADMIN_SECRET, self.admin_secret.clone())
    }

    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self::new(
            record.require_str(FIELD_CLUSTER_NAME)?,
            record.require_str(FIELD_FSID)?,
            record.require_str(FIELD_QUORUM_SECRET)?,
            record.require_str(FIELD_ADMIN_SECRET)?,
        ))
    }
}

impl fmt::Debug for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterIdentity")
            .field("name", &self.name)
            .field("fsid", &self.fsid)
            .field("quorum_secret", &"<redacted>")
            .field("admin_secret", &"<redacted>")
            .field("external", &self.external)
            .finish()
    }
}

/// Load-or-create access to the persisted identity
pub struct IdentityStore {
    store: Arc<dyn RecordStore>,
    keygen: Arc<dyn KeyGenerator>,
    io: IoContext,
}

impl IdentityStore {
    pub fn new(store: Arc<dyn RecordStore>, keygen: Arc<dyn KeyGenerator>, io: IoContext) -> Self {
        Self { store, keygen, io }
    }

    fn key(namespace: &str) -> RecordKey {
        RecordKey::secret(namespace, IDENTITY_RECORD_NAME)
    }

    /// Load the persisted identity, `NotFound` when absent
    pub async fn load(&self, namespace: &str) -> Result<ClusterIdentity> {
        let record = self.store.get(&Self::key(namespace)).await?;
        ClusterIdentity::from_record(&record)
    }

    /// Load the identity, creating it when absent and `allow_create` is set
    ///
    /// With `allow_create` false an absent identity is `NotAuthorized` and
    /// nothing is written.
    pub async fn load_or_create(
        &self,
        namespace: &str,
        allow_create: bool,
    ) -> Result<ClusterIdentity> {
        let key = Self::key(namespace);
        if let Some(record) = self.store.get_optional(&key).await? {
            let identity = ClusterIdentity::from_record(&record)?;
            tracing::debug!(namespace = %namespace, fsid = %identity.fsid(), "Loaded cluster identity");
            return Ok(identity);
        }

        if !allow_create {
            return Err(Error::NotAuthorized {
                reason: format!(
                    "no cluster identity in namespace {} and creation is not allowed",
                    namespace
                ),
            });
        }

        let fsid = self.io.gen_uuid();
        let quorum_secret = self.keygen.generate_key(MON_ENTITY_NAME, MON_CAPS).await?;
        let admin_secret = self.keygen.generate_key(ADMIN_USERNAME, ADMIN_CAPS).await?;
        let identity = ClusterIdentity::new(namespace, fsid, quorum_secret, admin_secret);

        match self.store.create(&key, &identity.to_record()).await {
            Ok(()) => {
                tracing::info!(namespace = %namespace, fsid = %identity.fsid(), "Created cluster identity");
                Ok(identity)
            }
            Err(e) if e.is_conflict() => {
                tracing::info!(namespace = %namespace, "Lost identity creation race, loading winner");
                self.load(namespace).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::Capability;
    use async_trait::async_trait;
    use cairn_store::MemoryStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Default)]
    struct CountingKeys(AtomicU64);

    #[async_trait]
    impl KeyGenerator for CountingKeys {
        async fn generate_key(&self, entity: &str, _caps: &[Capability]) -> Result<String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}-key-{}", entity, n))
        }
    }

    fn identity_store(store: &MemoryStore) -> (IdentityStore, Arc<CountingKeys>) {
        let keys = Arc::new(CountingKeys::default());
        let ids = IdentityStore::new(Arc::new(store.clone()), keys.clone(), IoContext::production());
        (ids, keys)
    }

    #[tokio::test]
    async fn test_create_then_load_is_stable() {
        let store = MemoryStore::new();
        let (ids, keys) = identity_store(&store);

        let created = ids.load_or_create("rook-ceph", true).await.unwrap();
        assert_eq!(created.name(), "rook-ceph");
        assert_eq!(created.quorum_secret(), "mon.-key-0");
        assert_eq!(created.admin_secret(), "client.admin-key-1");
        assert!(uuid_like(created.fsid()));

        let again = ids.load_or_create("rook-ceph", true).await.unwrap();
        assert_eq!(again, created);
        assert_eq!(keys.0.load(Ordering::SeqCst), 2);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_read_only_caller_cannot_create() {
        let store = MemoryStore::new();
        let (ids, keys) = identity_store(&store);

        let err = ids.load_or_create("rook-ceph", false).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
        assert_eq!(store.write_count(), 0);
        assert_eq!(keys.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_conflict_returns_winner() {
        let store = MemoryStore::new();
        let winner = ClusterIdentity::new("rook-ceph", "winner-fsid", "q", "a");
        let (ids, _) = identity_store(&store);

        // Another writer creates between our absent read and our create
        let racing = RacingStore {
            inner: store.clone(),
            winner: winner.to_record(),
        };
        let ids = IdentityStore::new(Arc::new(racing), ids.keygen.clone(), IoContext::production());

        let got = ids.load_or_create("rook-ceph", true).await.unwrap();
        assert_eq!(got.fsid(), "winner-fsid");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let identity = ClusterIdentity::new("c", "f", "QUORUM", "ADMIN");
        let shown = format!("{:?}", identity);
        assert!(!shown.contains("QUORUM"));
        assert!(!shown.contains("ADMIN"));
    }

    #[test]
    fn test_placeholder_is_not_admin() {
        assert!(!ClusterIdentity::new("c", "f", "q", ADMIN_SECRET_PLACEHOLDER).has_admin_secret());
        assert!(ClusterIdentity::new("c", "f", "q", "AQB==").has_admin_secret());
    }

    fn uuid_like(s: &str) -> bool {
        s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4
    }

    struct RacingStore {
        inner: MemoryStore,
        winner: Record,
    }

    #[async_trait]
    impl RecordStore for RacingStore {
        async fn get(&self, key: &RecordKey) -> Result<Record> {
            self.inner.get(key).await
        }

        async fn create(&self, key: &RecordKey, _record: &Record) -> Result<()> {
            self.inner.create(key, &self.winner).await?;
            Err(key.conflict())
        }

        async fn update(&self, key: &RecordKey, record: &Record) -> Result<()> {
            self.inner.update(key, record).await
        }
    }
}
