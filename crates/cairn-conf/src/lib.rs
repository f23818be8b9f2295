//! Cairn Conf
//!
//! Synthesizes the configuration file the storage cluster's daemons read.
//!
//! # Overview
//!
//! - [`document`] - typed section/key/value document, parser and pure merge
//! - [`defaults`] - the generated default document
//! - [`render`] - override loading and writing the config and admin keyring
//!
//! The main config never carries secret material. The admin secret goes to a
//! separate keyring file that the config only names by path.

pub mod defaults;
pub mod document;
pub mod render;

pub use defaults::build_default;
pub use document::ConfigDocument;
pub use render::{load_override, ConfigRenderer, ADMIN_KEYRING_FILE_NAME, MON_KEYRING_FILE_NAME};
