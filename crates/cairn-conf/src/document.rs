//! INI-style configuration document
//!
//! Sections map keys to string values. Keys are canonicalized on the way in:
//! spaces and dashes become underscores, so `mon host`, `mon-host` and
//! `mon_host` name the same key, as they do for the daemons.

use cairn_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Section name to key/value mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

fn is_blank_or_comment(text: &str) -> bool {
    let text = text.trim_start();
    text.is_empty() || text.starts_with('#') || text.starts_with(';')
}

/// Canonical form of a key
pub fn canonical_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut pending_sep = false;
    for c in key.trim().chars() {
        if c == ' ' || c == '-' || c == '_' || c == '\t' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(c);
    }
    out
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse document text
    ///
    /// Blank lines and lines starting with `#` or `;` are skipped, as is a
    /// comment after a section header. Every key must sit under a
    /// `[section]` header.
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = Self::new();
        let mut section: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let lineno = idx + 1;

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .split_once(']')
                    .filter(|(_, trailing)| is_blank_or_comment(trailing))
                    .map(|(name, _)| name.trim())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        Error::parse("config", format!("line {}: bad section header {:?}", lineno, line))
                    })?;
                doc.sections.entry(name.to_string()).or_default();
                section = Some(name.to_string());
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::parse("config", format!("line {}: expected key = value", lineno))
            })?;
            let key = canonical_key(key);
            if key.is_empty() {
                return Err(Error::parse("config", format!("line {}: empty key", lineno)));
            }
            let section = section.as_deref().ok_or_else(|| {
                Error::parse("config", format!("line {}: key {:?} outside any section", lineno, key))
            })?;
            doc.set(section, &key, value.trim());
        }

        Ok(doc)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)?
            .get(&canonical_key(key))
            .map(String::as_str)
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(canonical_key(key), value.into());
    }

    /// Set only when `value` is present
    pub fn set_opt(&mut self, section: &str, key: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.set(section, key, value);
        }
    }

    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(BTreeMap::is_empty)
    }

    /// Overlay `other` at (section, key) granularity
    ///
    /// Keys in `other` replace ours, keys only we have are kept, sections only
    /// `other` has are added. Merging the same document twice is a no-op the
    /// second time.
    pub fn merge(&mut self, other: &ConfigDocument) {
        for (name, entries) in &other.sections {
            let section = self.sections.entry(name.clone()).or_default();
            for (key, value) in entries {
                section.insert(key.clone(), value.clone());
            }
        }
    }

    /// Merged copy, leaving `self` untouched
    pub fn merged(&self, other: &ConfigDocument) -> ConfigDocument {
        let mut out = self.clone();
        out.merge(other);
        out
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, entries) in &self.sections {
            if !first {
                writeln!(f)?;
            }
            first = false;
            writeln!(f, "[{}]", name)?;
            for (key, value) in entries {
                writeln!(f, "{} = {}", key, value)?;
            }
        }
        Ok(())
    }
}
