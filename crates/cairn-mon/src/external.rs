//! Credentials for externally-managed clusters
//!
//! An external cluster's credentials are imported by an out-of-band tool.
//! [`CredentialPoll`] looks for them at a fixed interval until either the
//! identity carries a real admin secret, or all four service-scoped secrets
//! are present. Lookup failures count as "not yet present".
//!
//! ```text
//!   poll_once ──► Ready(credential) ──► done
//!       │
//!       └──► Pending ──► sleep(interval) | shutdown ──► Cancelled
//!                              │
//!                              └──► poll_once
//! ```

use crate::identity::ClusterIdentity;
use cairn_core::{Error, Result, TimeProvider, ADMIN_USERNAME};
use cairn_core::{
    CSI_CEPHFS_NODE_RECORD_NAME, CSI_CEPHFS_PROVISIONER_RECORD_NAME, CSI_RBD_NODE_RECORD_NAME,
    CSI_RBD_PROVISIONER_RECORD_NAME, EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS,
    HEALTH_CHECKER_RECORD_NAME, IDENTITY_RECORD_NAME,
};
use cairn_store::{RecordKey, RecordStore};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Username and secret key pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret_key: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Resolved credential of an external cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalCredential {
    /// Full administrative access
    Admin(Credential),
    /// Four service-scoped credentials, plus the health checker when imported
    ServiceScoped {
        health_checker: Option<Credential>,
        rbd_node: Credential,
        rbd_provisioner: Credential,
        cephfs_node: Credential,
        cephfs_provisioner: Credential,
    },
}

impl ExternalCredential {
    /// Username the operator itself connects as
    pub fn username(&self) -> &str {
        match self {
            Self::Admin(c) => &c.username,
            Self::ServiceScoped {
                health_checker: Some(c),
                ..
            } => &c.username,
            Self::ServiceScoped { rbd_provisioner, .. } => &rbd_provisioner.username,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready(ExternalCredential),
    /// Names of the records still missing
    Pending { missing: Vec<&'static str> },
}

impl PollOutcome {
    /// `RetryableUnavailable` while credentials are still missing
    pub fn into_result(self) -> Result<ExternalCredential> {
        match self {
            Self::Ready(credential) => Ok(credential),
            Self::Pending { missing } => Err(Error::unavailable(format!(
                "external credentials missing: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// A service secret record and the field names it stores its pair under
struct ServiceSecret {
    name: &'static str,
    user_field: &'static str,
    key_field: &'static str,
}

const RBD_NODE: ServiceSecret = ServiceSecret {
    name: CSI_RBD_NODE_RECORD_NAME,
    user_field: "userID",
    key_field: "userKey",
};
const RBD_PROVISIONER: ServiceSecret = ServiceSecret {
    name: CSI_RBD_PROVISIONER_RECORD_NAME,
    user_field: "userID",
    key_field: "userKey",
};
const CEPHFS_NODE: ServiceSecret = ServiceSecret {
    name: CSI_CEPHFS_NODE_RECORD_NAME,
    user_field: "adminID",
    key_field: "adminKey",
};
const CEPHFS_PROVISIONER: ServiceSecret = ServiceSecret {
    name: CSI_CEPHFS_PROVISIONER_RECORD_NAME,
    user_field: "adminID",
    key_field: "adminKey",
};
const HEALTH_CHECKER: ServiceSecret = ServiceSecret {
    name: HEALTH_CHECKER_RECORD_NAME,
    user_field: "userID",
    key_field: "userKey",
};

/// Polling state machine for external credentials
pub struct CredentialPoll {
    store: Arc<dyn RecordStore>,
    time: Arc<dyn TimeProvider>,
    namespace: String,
    interval_ms: u64,
    polls: u64,
}

impl CredentialPoll {
    pub fn new(
        store: Arc<dyn RecordStore>,
        time: Arc<dyn TimeProvider>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            time,
            namespace: namespace.into(),
            interval_ms: EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS,
            polls: 0,
        }
    }

    /// Poll less often than the default; shorter intervals are ignored
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms.max(EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS);
        self
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Number of polls performed so far
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Look once; never fails, errors read as "not yet present"
    pub async fn poll_once(&mut self) -> PollOutcome {
        self.polls += 1;

        if let Some(admin) = self.admin_credential().await {
            tracing::info!(namespace = %self.namespace, "Found admin credential for external cluster");
            return PollOutcome::Ready(ExternalCredential::Admin(admin));
        }

        let mut missing = Vec::new();
        let mut found = Vec::with_capacity(4);
        for secret in [RBD_NODE, RBD_PROVISIONER, CEPHFS_NODE, CEPHFS_PROVISIONER] {
            match self.service_credential(&secret).await {
                Some(credential) => found.push(credential),
                None => missing.push(secret.name),
            }
        }

        let mut found = found.into_iter();
        match (found.next(), found.next(), found.next(), found.next()) {
            (Some(rbd_node), Some(rbd_provisioner), Some(cephfs_node), Some(cephfs_provisioner)) => {
                let health_checker = self.service_credential(&HEALTH_CHECKER).await;
                tracing::info!(
                    namespace = %self.namespace,
                    health_checker = health_checker.is_some(),
                    "Found service credentials for external cluster"
                );
                PollOutcome::Ready(ExternalCredential::ServiceScoped {
                    health_checker,
                    rbd_node,
                    rbd_provisioner,
                    cephfs_node,
                    cephfs_provisioner,
                })
            }
            _ => PollOutcome::Pending { missing },
        }
    }

    /// Poll until credentials are present or `shutdown` turns true
    ///
    /// Dropping the shutdown sender also cancels.
    pub async fn resolve(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<ExternalCredential> {
        loop {
            if *shutdown.borrow() {
                return Err(self.cancelled());
            }

            match self.poll_once().await.into_result() {
                Ok(credential) => return Ok(credential),
                Err(e) => {
                    tracing::info!(
                        namespace = %self.namespace,
                        reason = %e,
                        interval_ms = self.interval_ms,
                        "External cluster credentials not yet available"
                    );
                }
            }

            tokio::select! {
                _ = self.time.sleep_ms(self.interval_ms) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(self.cancelled());
                    }
                }
            }
        }
    }

    fn cancelled(&self) -> Error {
        tracing::info!(namespace = %self.namespace, polls = self.polls, "External credential resolution cancelled");
        Error::Cancelled {
            operation: format!("resolve external credentials in {}", self.namespace),
        }
    }

    async fn admin_credential(&self) -> Option<Credential> {
        let key = RecordKey::secret(&self.namespace, IDENTITY_RECORD_NAME);
        let identity = match self.store.get(&key).await {
            Ok(record) => ClusterIdentity::from_record(&record),
            Err(e) => Err(e),
        };
        match identity {
            Ok(identity) if identity.has_admin_secret() => {
                Some(Credential::new(ADMIN_USERNAME, identity.admin_secret()))
            }
            Ok(_) => None,
            Err(e) => {
                self.log_lookup_error(IDENTITY_RECORD_NAME, &e);
                None
            }
        }
    }

    async fn service_credential(&self, secret: &ServiceSecret) -> Option<Credential> {
        let key = RecordKey::secret(&self.namespace, secret.name);
        let lookup = async {
            let record = self.store.get(&key).await?;
            Ok::<_, Error>(Credential::new(
                record.require_str(secret.user_field)?,
                record.require_str(secret.key_field)?,
            ))
        };
        match lookup.await {
            Ok(credential) => Some(credential),
            Err(e) => {
                self.log_lookup_error(secret.name, &e);
                None
            }
        }
    }

    fn log_lookup_error(&self, record: &str, e: &Error) {
        if e.is_not_found() {
            tracing::debug!(namespace = %self.namespace, record = %record, "Credential record not present");
        } else {
            tracing::warn!(namespace = %self.namespace, record = %record, error = %e, "Credential lookup failed");
        }
    }
}
