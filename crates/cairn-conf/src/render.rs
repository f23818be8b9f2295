//! Rendering the config and keyrings to disk
//!
//! Files land in one destination directory, created owner-only when absent:
//!
//! ```text
//! <dir>/<cluster>.config        merged config, no secrets
//! <dir>/client.admin.keyring    admin secret, mode 0600
//! <dir>/mon.keyring             quorum + admin secret, mode 0600
//! ```
//!
//! Write failures are returned to the caller, never retried here.

use crate::document::ConfigDocument;
use cairn_core::{Error, Result, CONFIG_DIR_MODE, CONFIG_OVERRIDE_RECORD_NAME};
use cairn_core::{CONFIG_OVERRIDE_SIZE_BYTES_MAX, KEYRING_FILE_MODE};
use cairn_mon::{admin_keyring, shared_mon_keyring, ClusterIdentity};
use cairn_store::{RecordKey, RecordStore};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const ADMIN_KEYRING_FILE_NAME: &str = "client.admin.keyring";
pub const MON_KEYRING_FILE_NAME: &str = "mon.keyring";

const FIELD_OVERRIDE: &str = "config";

/// Load the operator-supplied override document
///
/// An absent record or field means no override. Text that does not parse is
/// a `Parse` error.
pub async fn load_override(
    store: &dyn RecordStore,
    namespace: &str,
) -> Result<Option<ConfigDocument>> {
    let key = RecordKey::config(namespace, CONFIG_OVERRIDE_RECORD_NAME);
    let record = match store.get_optional(&key).await? {
        Some(record) => record,
        None => return Ok(None),
    };
    let text = match record.get_str(FIELD_OVERRIDE)? {
        Some(text) => text,
        None => return Ok(None),
    };
    if text.len() > CONFIG_OVERRIDE_SIZE_BYTES_MAX {
        return Err(Error::parse(
            FIELD_OVERRIDE,
            format!(
                "override is {} bytes, limit is {}",
                text.len(),
                CONFIG_OVERRIDE_SIZE_BYTES_MAX
            ),
        ));
    }

    let doc = ConfigDocument::parse(text)?;
    tracing::debug!(namespace = %namespace, sections = doc.section_names().count(), "Loaded config override");
    Ok(Some(doc))
}

/// Writes rendered artifacts under one destination directory
#[derive(Debug, Clone)]
pub struct ConfigRenderer {
    dir: PathBuf,
}

impl ConfigRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self, cluster_name: &str) -> PathBuf {
        self.dir.join(format!("{}.config", cluster_name))
    }

    pub fn admin_keyring_path(&self) -> PathBuf {
        self.dir.join(ADMIN_KEYRING_FILE_NAME)
    }

    pub fn mon_keyring_path(&self) -> PathBuf {
        self.dir.join(MON_KEYRING_FILE_NAME)
    }

    /// Merge `override_doc` onto `document` and write `<dir>/<cluster>.config`
    pub async fn render(
        &self,
        cluster_name: &str,
        document: &ConfigDocument,
        override_doc: Option<&ConfigDocument>,
    ) -> Result<PathBuf> {
        let merged = match override_doc {
            Some(over) => document.merged(over),
            None => document.clone(),
        };

        self.ensure_dir().await?;
        let path = self.config_path(cluster_name);
        tokio::fs::write(&path, merged.to_string())
            .await
            .map_err(|e| Error::io(&path, e))?;

        tracing::info!(
            path = %path.display(),
            overridden = override_doc.is_some(),
            "Rendered cluster config"
        );
        Ok(path)
    }

    /// Write the admin keyring, owner-only
    pub async fn write_admin_keyring(&self, identity: &ClusterIdentity) -> Result<PathBuf> {
        let path = self.admin_keyring_path();
        self.write_secret(&path, &admin_keyring(identity.admin_secret()))
            .await?;
        Ok(path)
    }

    /// Write the keyring shared by quorum members, owner-only
    pub async fn write_mon_keyring(&self, identity: &ClusterIdentity) -> Result<PathBuf> {
        let path = self.mon_keyring_path();
        self.write_secret(&path, &shared_mon_keyring(identity)).await?;
        Ok(path)
    }

    async fn ensure_dir(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, e))?
        {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, e))?;
        set_mode(&self.dir, CONFIG_DIR_MODE).await
    }

    async fn write_secret(&self, path: &Path, contents: &str) -> Result<()> {
        self.ensure_dir().await?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(KEYRING_FILE_MODE);

        let mut file = options.open(path).await.map_err(|e| Error::io(path, e))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| Error::io(path, e))?;
        file.flush().await.map_err(|e| Error::io(path, e))?;
        drop(file);

        // A pre-existing file keeps its old mode through open(); reset it
        set_mode(path, KEYRING_FILE_MODE).await?;
        tracing::debug!(path = %path.display(), "Wrote keyring");
        Ok(())
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_store::{MemoryStore, Record};
    use tempfile::TempDir;

    fn defaults() -> ConfigDocument {
        let mut doc = ConfigDocument::new();
        doc.set("global", "fsid", "myfsid");
        doc.set("global", "mon host", "[v2:10.0.0.1:3300,v1:10.0.0.1:6789]");
        doc
    }

    #[tokio::test]
    async fn test_render_with_override() {
        let dir = TempDir::new().unwrap();
        let renderer = ConfigRenderer::new(dir.path());
        let over =
            ConfigDocument::parse("[global]\n    bluestore_min_alloc_size_hdd = 4096").unwrap();

        let path = renderer
            .render("foo-cluster", &defaults(), Some(&over))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("foo-cluster.config"));

        let written = ConfigDocument::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.get("global", "fsid"), Some("myfsid"));
        assert_eq!(
            written.get("global", "bluestore_min_alloc_size_hdd"),
            Some("4096")
        );
    }

    #[tokio::test]
    async fn test_render_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let renderer = ConfigRenderer::new(dir.path());
        let over = ConfigDocument::parse("[global]\ndebug mon = 20").unwrap();

        let path = renderer.render("c", &defaults(), Some(&over)).await.unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        renderer.render("c", &defaults(), Some(&over)).await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_creates_owner_only_dir_and_keyring() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let dir = root.path().join("nested").join("conf");
        let renderer = ConfigRenderer::new(&dir);
        let identity = ClusterIdentity::new("c", "f", "MONKEY", "ADMINKEY");

        let keyring = renderer.write_admin_keyring(&identity).await.unwrap();
        let dir_mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        let file_mode = std::fs::metadata(&keyring).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);

        let text = std::fs::read_to_string(&keyring).unwrap();
        assert!(text.contains("ADMINKEY"));
        assert!(!text.contains("MONKEY"));
    }

    #[tokio::test]
    async fn test_unwritable_destination_surfaces_error() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let renderer = ConfigRenderer::new(blocker.join("conf"));
        let err = renderer.render("c", &defaults(), None).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn test_load_override() {
        let store = MemoryStore::new();
        assert_eq!(load_override(&store, "ns").await.unwrap(), None);

        let key = RecordKey::config("ns", CONFIG_OVERRIDE_RECORD_NAME);
        store.put_raw(key.clone(), Record::new()).await;
        assert_eq!(load_override(&store, "ns").await.unwrap(), None);

        store
            .put_raw(key.clone(), Record::new().with("config", "[global]\nosd_pool_default_size = 3"))
            .await;
        let doc = load_override(&store, "ns").await.unwrap().unwrap();
        assert_eq!(doc.get("global", "osd pool default size"), Some("3"));

        store
            .put_raw(key, Record::new().with("config", "no section = here"))
            .await;
        assert!(matches!(
            load_override(&store, "ns").await.unwrap_err(),
            Error::Parse { .. }
        ));
    }
}
