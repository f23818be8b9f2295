//! Constants for cairn
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Persisted Record Names
// =============================================================================

/// Secret holding the cluster identity (name, fsid, quorum and admin secrets)
pub const IDENTITY_RECORD_NAME: &str = "rook-ceph-mon";

/// Config record holding the member directory, ID counter and node pinning
pub const MEMBERSHIP_RECORD_NAME: &str = "rook-ceph-mon-endpoints";

/// Config record holding the operator-supplied config override
pub const CONFIG_OVERRIDE_RECORD_NAME: &str = "rook-config-override";

/// Secret holding the health-checker credential of an external cluster
pub const HEALTH_CHECKER_RECORD_NAME: &str = "rook-ceph-operator-creds";

/// Secret holding the block-storage node credential
pub const CSI_RBD_NODE_RECORD_NAME: &str = "rook-csi-rbd-node";

/// Secret holding the block-storage provisioner credential
pub const CSI_RBD_PROVISIONER_RECORD_NAME: &str = "rook-csi-rbd-provisioner";

/// Secret holding the filesystem node credential
pub const CSI_CEPHFS_NODE_RECORD_NAME: &str = "rook-csi-cephfs-node";

/// Secret holding the filesystem provisioner credential
pub const CSI_CEPHFS_PROVISIONER_RECORD_NAME: &str = "rook-csi-cephfs-provisioner";

// =============================================================================
// Quorum Member Addressing
// =============================================================================

/// Port of the legacy (v1) wire protocol
pub const MON_PORT_LEGACY: u16 = 6789;

/// Port of the modern (v2) wire protocol
pub const MON_PORT_MODERN: u16 = 3300;

/// Maximum number of quorum members tracked in one directory
pub const MON_COUNT_MAX: usize = 64;

/// Maximum length of a member name in bytes
pub const MON_NAME_LENGTH_BYTES_MAX: usize = 63;

/// Username of the cluster administrator
pub const ADMIN_USERNAME: &str = "client.admin";

/// Entity name of the shared quorum key
pub const MON_ENTITY_NAME: &str = "mon.";

// =============================================================================
// External Clusters
// =============================================================================

/// Fixed interval between external credential polls in milliseconds (60 sec)
pub const EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS: u64 = 60 * 1000;

/// Value the external-cluster export writes in place of a real admin key
pub const ADMIN_SECRET_PLACEHOLDER: &str = "admin-secret";

// =============================================================================
// Capability Drivers
// =============================================================================

/// Minimum platform major version for optional storage drivers
pub const DRIVER_PLATFORM_MAJOR_MIN: u32 = 1;

/// Minimum platform minor version for optional storage drivers
pub const DRIVER_PLATFORM_MINOR_MIN: u32 = 13;

// =============================================================================
// Rendered Configuration
// =============================================================================

/// Highest verbosity written to the daemon config (debug level)
pub const LOG_VERBOSITY_MAX: u32 = 10;

/// Maximum size of an override document in bytes (1 MB)
pub const CONFIG_OVERRIDE_SIZE_BYTES_MAX: usize = 1024 * 1024;

/// Unix permissions of rendered directories (owner-only)
pub const CONFIG_DIR_MODE: u32 = 0o700;

/// Unix permissions of files carrying secret material (owner-only)
pub const KEYRING_FILE_MODE: u32 = 0o600;

// Compile-time assertions for constant validity
const _: () = {
    assert!(MON_PORT_LEGACY != MON_PORT_MODERN);
    assert!(EXTERNAL_CREDENTIAL_POLL_INTERVAL_MS == 60_000);
    assert!(LOG_VERBOSITY_MAX == 10);
    assert!(MON_COUNT_MAX >= 5);
};
