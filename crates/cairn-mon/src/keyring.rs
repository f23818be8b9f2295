//! Key generation and keyring rendering
//!
//! Secret bytes come from the native `ceph-authtool` utility. This module only
//! decides what to ask it for and how the result is laid out on disk.

use async_trait::async_trait;
use cairn_core::{Error, Result, ADMIN_USERNAME};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;

use crate::identity::ClusterIdentity;

/// One `--cap <service> '<grant>'` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub service: &'static str,
    pub grant: &'static str,
}

impl Capability {
    pub const fn allow_all(service: &'static str) -> Self {
        Self {
            service,
            grant: "allow *",
        }
    }
}

/// Capabilities of the quorum secret
pub const MON_CAPS: &[Capability] = &[Capability::allow_all("mon")];

/// Capabilities of the admin secret
pub const ADMIN_CAPS: &[Capability] = &[
    Capability::allow_all("mon"),
    Capability::allow_all("osd"),
    Capability::allow_all("mgr"),
    Capability::allow_all("mds"),
];

/// External collaborator producing cryptographic secrets
#[async_trait]
pub trait KeyGenerator: Send + Sync + std::fmt::Debug {
    /// Generate a new secret for `entity` with the given capabilities
    async fn generate_key(&self, entity: &str, caps: &[Capability]) -> Result<String>;
}

/// Pull the secret out of a keyring file's text
///
/// Looks for the first `key = <secret>` line.
pub fn extract_key(keyring: &str) -> Result<String> {
    for line in keyring.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() == Some(&"key") {
            return match fields.as_slice() {
                [_, "=", secret, ..] => Ok((*secret).to_string()),
                _ => Err(Error::parse("keyring", format!("malformed key line {:?}", line.trim()))),
            };
        }
    }
    Err(Error::parse("keyring", "no key line found"))
}

/// Keyring granting full administrative access
pub fn admin_keyring(admin_secret: &str) -> String {
    format!(
        "[{}]\n\tkey = {}\n\tcaps mds = \"allow *\"\n\tcaps mon = \"allow *\"\n\tcaps osd = \"allow *\"\n\tcaps mgr = \"allow *\"\n",
        ADMIN_USERNAME, admin_secret
    )
}

/// Keyring shared by all quorum members: the `mon.` key followed by the admin key
pub fn shared_mon_keyring(identity: &ClusterIdentity) -> String {
    format!(
        "[mon.]\n\tkey = {}\n\tcaps mon = \"allow *\"\n\n{}",
        identity.quorum_secret(),
        admin_keyring(identity.admin_secret())
    )
}

// ============================================================================
// ceph-authtool
// ============================================================================

static KEYRING_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Production key generator shelling out to `ceph-authtool`
#[derive(Debug, Clone)]
pub struct AuthtoolKeyGenerator {
    binary: String,
    work_dir: PathBuf,
}

impl AuthtoolKeyGenerator {
    /// Keyrings are created under `work_dir` and removed once read
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "ceph-authtool".to_string(),
            work_dir: work_dir.into(),
        }
    }

    /// Use a different executable
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn args(keyring: &str, entity: &str, caps: &[Capability]) -> Vec<String> {
        let mut args = vec![
            "--create-keyring".to_string(),
            keyring.to_string(),
            "--gen-key".to_string(),
            "-n".to_string(),
            entity.to_string(),
        ];
        for cap in caps {
            args.push("--cap".to_string());
            args.push(cap.service.to_string());
            args.push(cap.grant.to_string());
        }
        args
    }
}

#[async_trait]
impl KeyGenerator for AuthtoolKeyGenerator {
    async fn generate_key(&self, entity: &str, caps: &[Capability]) -> Result<String> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| Error::io(&self.work_dir, e))?;

        let seq = KEYRING_SEQUENCE.fetch_add(1, Ordering::SeqCst);
        let keyring = self
            .work_dir
            .join(format!("{}.{}.keyring", entity.trim_end_matches('.'), seq));
        let keyring_arg = keyring.display().to_string();

        let output = Command::new(&self.binary)
            .args(Self::args(&keyring_arg, entity, caps))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::KeyGeneration {
                entity: entity.to_string(),
                reason: format!("failed to run {}: {}", self.binary, e),
            })?;

        if !output.status.success() {
            return Err(Error::KeyGeneration {
                entity: entity.to_string(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.binary,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let text = tokio::fs::read_to_string(&keyring)
            .await
            .map_err(|e| Error::io(&keyring, e));
        if let Err(e) = tokio::fs::remove_file(&keyring).await {
            tracing::warn!(path = %keyring.display(), error = %e, "Failed to remove generated keyring");
        }

        let key = extract_key(&text?)?;
        tracing::debug!(entity = %entity, "Generated key");
        Ok(key)
    }
}
