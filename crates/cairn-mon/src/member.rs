//! Quorum member naming and the address directory grammar
//!
//! Member names come in two generations. Legacy names `mon<N>` carry their ID
//! as a decimal suffix. Current names are letters in bijective base 26
//! (`a`=0 ... `z`=25, `aa`=26, ...). Either may appear behind the
//! `rook-ceph-mon-` prefix. Names outside both forms carry no ID.
//!
//! The persisted directory is a comma-separated list of `name=address`
//! entries. A bare address following an entry is that member's additional
//! modern-protocol address:
//!
//! ```text
//! a=10.0.0.1:6789,10.0.0.1:3300,b=10.0.0.2:6789
//! ```

use cairn_core::{Error, Result, MON_NAME_LENGTH_BYTES_MAX, MON_PORT_MODERN};

const MEMBER_NAME_PREFIX: &str = "rook-ceph-mon-";
const LEGACY_NAME_PREFIX: &str = "mon";
const LETTERS: u32 = 26;

/// A quorum member as persisted in the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    /// ID encoded in the name, `None` for names that encode nothing
    pub id: Option<u32>,
    /// `host:port` of the legacy (v1) endpoint
    pub legacy_addr: String,
    /// `host:port` of the modern (v2) endpoint when it is not the default port
    pub modern_addr: Option<String>,
}

impl Member {
    pub fn new(name: impl Into<String>, legacy_addr: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name_to_index(&name),
            name,
            legacy_addr: legacy_addr.into(),
            modern_addr: None,
        }
    }

    pub fn with_modern_addr(mut self, addr: impl Into<String>) -> Self {
        self.modern_addr = Some(addr.into());
        self
    }

    /// Host part of the legacy address
    pub fn host(&self) -> &str {
        match self.legacy_addr.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                host
            }
            _ => &self.legacy_addr,
        }
    }

    /// Modern endpoint, derived from the host when not set explicitly
    pub fn modern_endpoint(&self) -> String {
        match &self.modern_addr {
            Some(addr) => addr.clone(),
            None => format!("{}:{}", self.host(), MON_PORT_MODERN),
        }
    }

    /// Bracketed dual-protocol address group, `[v2:<host>:3300,v1:<host>:6789]`
    pub fn address_group(&self) -> String {
        format!("[v2:{},v1:{}]", self.modern_endpoint(), self.legacy_addr)
    }
}

/// Decode the ID a member name carries
pub fn name_to_index(name: &str) -> Option<u32> {
    let name = name.strip_prefix(MEMBER_NAME_PREFIX).unwrap_or(name);
    if name.is_empty() || name.len() > MON_NAME_LENGTH_BYTES_MAX {
        return None;
    }

    if let Some(digits) = name.strip_prefix(LEGACY_NAME_PREFIX) {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return digits.parse().ok();
        }
    }

    if !name.bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }
    let mut acc: u32 = 0;
    for b in name.bytes() {
        acc = acc
            .checked_mul(LETTERS)?
            .checked_add(u32::from(b - b'a') + 1)?;
    }
    Some(acc - 1)
}

/// Render the lettered name for an ID
pub fn index_to_name(index: u32) -> String {
    let mut letters = Vec::new();
    let mut i = index;
    loop {
        letters.push(b'a' + (i % LETTERS) as u8);
        if i < LETTERS {
            break;
        }
        i = i / LETTERS - 1;
    }
    letters.reverse();
    letters.into_iter().map(char::from).collect()
}

/// Data directory of a member relative to the host state root
pub fn data_dir_relative_path(name: &str) -> String {
    if name.contains(LEGACY_NAME_PREFIX) {
        format!("{}/data", name)
    } else {
        format!("mon-{}/data", name)
    }
}

/// Parse the persisted member directory
pub fn parse_directory(directory: &str) -> Result<Vec<Member>> {
    let mut members: Vec<Member> = Vec::new();
    for token in directory.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('=') {
            Some((name, addr)) => {
                let (name, addr) = (name.trim(), addr.trim());
                if name.is_empty() || addr.is_empty() {
                    return Err(Error::parse("data", format!("incomplete entry {:?}", token)));
                }
                if members.iter().any(|m| m.name == name) {
                    return Err(Error::parse("data", format!("duplicate member {:?}", name)));
                }
                members.push(Member::new(name, addr));
            }
            None => {
                let last = members.last_mut().ok_or_else(|| {
                    Error::parse("data", format!("address {:?} has no member", token))
                })?;
                if last.modern_addr.is_some() {
                    return Err(Error::parse(
                        "data",
                        format!("member {:?} has more than two addresses", last.name),
                    ));
                }
                last.modern_addr = Some(token.to_string());
            }
        }
    }
    Ok(members)
}

/// Serialize members back into the directory grammar
pub fn serialize_directory(members: &[Member]) -> String {
    members
        .iter()
        .map(|m| match &m.modern_addr {
            Some(modern) => format!("{}={},{}", m.name, m.legacy_addr, modern),
            None => format!("{}={}", m.name, m.legacy_addr),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lettered_names() {
        assert_eq!(name_to_index("a"), Some(0));
        assert_eq!(name_to_index("z"), Some(25));
        assert_eq!(name_to_index("aa"), Some(26));
        assert_eq!(name_to_index("ab"), Some(27));
        for i in [0, 1, 25, 26, 27, 51, 52, 701, 702, 18277] {
            assert_eq!(name_to_index(&index_to_name(i)), Some(i), "index {}", i);
        }
        assert_eq!(index_to_name(26), "aa");
        assert_eq!(index_to_name(701), "zz");
        assert_eq!(index_to_name(702), "aaa");
    }

    #[test]
    fn test_legacy_and_prefixed_names() {
        assert_eq!(name_to_index("mon0"), Some(0));
        assert_eq!(name_to_index("mon12"), Some(12));
        assert_eq!(name_to_index("rook-ceph-mon-c"), Some(2));
        assert_eq!(name_to_index("rook-ceph-mon-mon3"), Some(3));
        // "mon" alone is a lettered name
        assert_eq!(name_to_index("mon"), Some(9191));
    }

    #[test]
    fn test_names_without_ids() {
        assert_eq!(name_to_index(""), None);
        assert_eq!(name_to_index("node-1"), None);
        assert_eq!(name_to_index("A"), None);
        assert_eq!(name_to_index(&"z".repeat(40)), None);
    }

    #[test]
    fn test_data_dir_relative_path() {
        assert_eq!(data_dir_relative_path("mon0"), "mon0/data");
        assert_eq!(data_dir_relative_path("a"), "mon-a/data");
    }

    #[test]
    fn test_parse_directory_with_modern_addresses() {
        let members =
            parse_directory("a=10.0.0.1:6789,10.0.0.1:3301, b=10.0.0.2:6789").unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].modern_addr.as_deref(), Some("10.0.0.1:3301"));
        assert_eq!(members[1].id, Some(1));
        assert_eq!(
            serialize_directory(&members),
            "a=10.0.0.1:6789,10.0.0.1:3301,b=10.0.0.2:6789"
        );
    }

    #[test]
    fn test_parse_directory_errors() {
        assert!(parse_directory("10.0.0.1:6789").is_err());
        assert!(parse_directory("a=").is_err());
        assert!(parse_directory("a=1.1.1.1:6789,b=1.1.1.2:6789,a=1.1.1.3:6789").is_err());
        assert!(parse_directory("a=1.1.1.1:6789,1.1.1.1:3300,1.1.1.1:3301").is_err());
        assert!(parse_directory("").unwrap().is_empty());
    }

    #[test]
    fn test_address_group() {
        let member = Member::new("mon0", "10.0.0.1:6789");
        assert_eq!(member.address_group(), "[v2:10.0.0.1:3300,v1:10.0.0.1:6789]");

        let member = Member::new("a", "10.0.0.1:6789").with_modern_addr("10.0.0.1:3301");
        assert_eq!(member.address_group(), "[v2:10.0.0.1:3301,v1:10.0.0.1:6789]");

        let member = Member::new("b", "[fd00::1]:6789");
        assert_eq!(member.address_group(), "[v2:[fd00::1]:3300,v1:[fd00::1]:6789]");
    }
}
