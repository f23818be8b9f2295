//! Generated default configuration

use crate::document::ConfigDocument;
use cairn_core::{DebugLevel, NetworkSettings, ADMIN_USERNAME};
use cairn_mon::{ClusterIdentity, MembershipRegistry};
use std::path::Path;

pub const GLOBAL_SECTION: &str = "global";

/// Subsystems whose debug level follows the derived verbosity
const DEBUG_SUBSYSTEMS: &[&str] = &[
    "debug default",
    "debug rados",
    "debug mon",
    "debug osd",
    "debug bluestore",
    "debug filestore",
    "debug journal",
    "debug leveldb",
];

/// Stock daemon settings
const STOCK_SETTINGS: &[(&str, &str)] = &[
    ("log to stderr", "true"),
    ("err to stderr", "true"),
    ("mon cluster log to stderr", "true"),
    ("log file", ""),
    ("mon cluster log file", ""),
    ("mon keyvaluedb", "rocksdb"),
    ("mon allow pool delete", "true"),
    ("mon max pg per osd", "1000"),
    ("osd pg bits", "11"),
    ("osd pgp bits", "11"),
    ("osd pool default size", "1"),
    ("osd pool default min size", "1"),
    ("osd pool default pg num", "100"),
    ("osd pool default pgp num", "100"),
    ("rbd default features", "3"),
    ("fatal signal handlers", "false"),
];

/// Build the default document for a cluster
///
/// `admin_keyring` is where the admin keyring will be written; only its path
/// lands in the document.
pub fn build_default(
    identity: &ClusterIdentity,
    registry: &MembershipRegistry,
    network: &NetworkSettings,
    level: DebugLevel,
    admin_keyring: &Path,
) -> ConfigDocument {
    let mut doc = ConfigDocument::new();

    doc.set(GLOBAL_SECTION, "fsid", identity.fsid());
    doc.set(GLOBAL_SECTION, "mon initial members", registry.quorum_member_list());
    doc.set(GLOBAL_SECTION, "mon host", registry.quorum_address_directory());

    doc.set_opt(GLOBAL_SECTION, "public addr", network.public_addr.as_deref());
    doc.set_opt(GLOBAL_SECTION, "public network", network.public_network.as_deref());
    doc.set_opt(GLOBAL_SECTION, "cluster addr", network.cluster_addr.as_deref());
    doc.set_opt(GLOBAL_SECTION, "cluster network", network.cluster_network.as_deref());

    for (key, value) in STOCK_SETTINGS {
        doc.set(GLOBAL_SECTION, key, *value);
    }

    let verbosity = level.verbosity().to_string();
    for key in DEBUG_SUBSYSTEMS {
        doc.set(GLOBAL_SECTION, key, verbosity.clone());
    }

    doc.set(ADMIN_USERNAME, "keyring", admin_keyring.display().to_string());
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_store::Record;

    fn fixtures() -> (ClusterIdentity, MembershipRegistry) {
        let identity = ClusterIdentity::new("foo-cluster", "id", "monsecret", "adminsecret");
        let registry = MembershipRegistry::from_record(
            "foo-cluster",
            &Record::new()
                .with("data", "mon0=10.0.0.1:6789,mon1=10.0.0.2:6789")
                .with("maxMonId", "1"),
        )
        .unwrap();
        (identity, registry)
    }

    fn network() -> NetworkSettings {
        NetworkSettings {
            public_addr: Some("10.1.1.1".into()),
            public_network: Some("10.1.1.0/24".into()),
            cluster_addr: Some("10.1.2.2".into()),
            cluster_network: Some("10.1.2.0/24".into()),
        }
    }

    #[test]
    fn test_required_keys() {
        let (identity, registry) = fixtures();
        let doc = build_default(
            &identity,
            &registry,
            &network(),
            DebugLevel::INFO,
            Path::new("/etc/foo/client.admin.keyring"),
        );

        assert_eq!(doc.get("global", "fsid"), Some("id"));
        let members: Vec<&str> = doc
            .get("global", "mon initial members")
            .unwrap()
            .split(' ')
            .collect();
        assert!(members.contains(&"mon0") && members.contains(&"mon1"));

        let hosts = doc.get("global", "mon_host").unwrap();
        for expected in [
            "[v2:10.0.0.1:3300,v1:10.0.0.1:6789]",
            "[v2:10.0.0.2:3300,v1:10.0.0.2:6789]",
        ] {
            assert!(hosts.contains(expected), "{} missing from {}", expected, hosts);
        }

        assert_eq!(doc.get("global", "public addr"), Some("10.1.1.1"));
        assert_eq!(doc.get("global", "public network"), Some("10.1.1.0/24"));
        assert_eq!(doc.get("global", "cluster addr"), Some("10.1.2.2"));
        assert_eq!(doc.get("global", "cluster network"), Some("10.1.2.0/24"));
        assert_eq!(
            doc.get("client.admin", "keyring"),
            Some("/etc/foo/client.admin.keyring")
        );
    }

    #[test]
    fn test_verbosity_fixed_points() {
        let (identity, registry) = fixtures();
        let keyring = Path::new("/k");
        let info = build_default(&identity, &registry, &network(), DebugLevel::INFO, keyring);
        let debug = build_default(&identity, &registry, &network(), DebugLevel::DEBUG, keyring);

        assert_eq!(info.get("global", "debug mon"), Some("0"));
        assert_eq!(debug.get("global", "debug mon"), Some("10"));
        assert_eq!(debug.get("global", "debug default"), Some("10"));
    }

    #[test]
    fn test_network_keys_absent_when_unset() {
        let (identity, registry) = fixtures();
        let doc = build_default(
            &identity,
            &registry,
            &NetworkSettings::default(),
            DebugLevel::INFO,
            Path::new("/k"),
        );
        assert_eq!(doc.get("global", "public addr"), None);
        assert_eq!(doc.get("global", "cluster network"), None);
    }

    #[test]
    fn test_no_secret_material() {
        let (identity, registry) = fixtures();
        let text = build_default(&identity, &registry, &network(), DebugLevel::DEBUG, Path::new("/k"))
            .to_string();
        assert!(!text.contains("monsecret"));
        assert!(!text.contains("adminsecret"));
    }
}
