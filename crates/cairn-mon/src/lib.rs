//! Cairn Mon
//!
//! Metadata of the storage cluster's quorum members ("mons") and the identity
//! they share.
//!
//! # Overview
//!
//! - [`identity`] - load-or-create of the cluster identity (fsid and secrets)
//! - [`keyring`] - the key-generation collaborator and keyring rendering
//! - [`member`] - member naming, ID decoding and the address directory grammar
//! - [`registry`] - member set, ID allocation and persistence
//! - [`mapping`] - best-effort node pinning
//! - [`external`] - credential polling for externally-managed clusters
//!
//! Nothing here is cached: every control cycle reloads identity and
//! membership from the record store, which is the source of truth.

pub mod external;
pub mod identity;
pub mod keyring;
pub mod mapping;
pub mod member;
pub mod registry;

pub use external::{Credential, CredentialPoll, ExternalCredential, PollOutcome};
pub use identity::{ClusterIdentity, IdentityStore};
pub use keyring::{
    admin_keyring, extract_key, shared_mon_keyring, AuthtoolKeyGenerator, Capability,
    KeyGenerator, ADMIN_CAPS, MON_CAPS,
};
pub use mapping::{NodeInfo, NodePinning, PinningLoad};
pub use member::{data_dir_relative_path, index_to_name, name_to_index, Member};
pub use registry::MembershipRegistry;
