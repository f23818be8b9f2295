//! Membership registry
//!
//! Reconstructed from the membership record at the start of every cycle.
//! The highest allocated ID is the larger of the persisted counter and the
//! highest ID any member name encodes, so a counter that under-reports after
//! a manual edit heals upward and never hands out an ID already in use.
//!
//! Allocation is not synchronized. The single reconcile writer allocates,
//! then persists members and counter together with [`MembershipRegistry::save`]
//! before allocating again.

use crate::mapping::{NodeInfo, NodePinning, PinningLoad};
use crate::member::{self, index_to_name, Member};
use cairn_core::{Error, Result, MEMBERSHIP_RECORD_NAME, MON_COUNT_MAX};
use cairn_store::{Record, RecordKey, RecordStore};

const FIELD_DIRECTORY: &str = "data";
const FIELD_MAX_ID: &str = "maxMonId";
const FIELD_MAPPING: &str = "mapping";

/// Counter value persisted when nothing has been allocated
const NO_ID_ALLOCATED: &str = "-1";

/// Member set of one namespace
#[derive(Debug, Clone)]
pub struct MembershipRegistry {
    namespace: String,
    members: Vec<Member>,
    max_id: Option<u32>,
    pinning: PinningLoad,
}

impl MembershipRegistry {
    /// Empty registry, nothing allocated
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            members: Vec::new(),
            max_id: None,
            pinning: PinningLoad::Ok(NodePinning::default()),
        }
    }

    fn key(namespace: &str) -> RecordKey {
        RecordKey::config(namespace, MEMBERSHIP_RECORD_NAME)
    }

    /// Load the registry; an absent record is an empty registry
    pub async fn load(store: &dyn RecordStore, namespace: &str) -> Result<Self> {
        match store.get_optional(&Self::key(namespace)).await? {
            None => Ok(Self::new(namespace)),
            Some(record) => Self::from_record(namespace, &record),
        }
    }

    /// Rebuild from a membership record
    pub fn from_record(namespace: &str, record: &Record) -> Result<Self> {
        let members = member::parse_directory(record.get_str(FIELD_DIRECTORY)?.unwrap_or(""))?;
        let derived = members.iter().filter_map(|m| m.id).max();

        let max_id = match parse_counter(record.get_str(FIELD_MAX_ID)?) {
            Ok(counter) => {
                if derived > counter {
                    tracing::warn!(
                        namespace = %namespace,
                        counter = ?counter,
                        derived = ?derived,
                        "Member names exceed the persisted counter, raising it"
                    );
                }
                counter.max(derived)
            }
            Err(e) => match derived {
                Some(derived) => {
                    tracing::error!(
                        namespace = %namespace,
                        error = %e,
                        derived,
                        "Unparseable member counter, using highest ID from member names"
                    );
                    Some(derived)
                }
                None => return Err(e),
            },
        };

        let pinning = NodePinning::load(record.get_str(FIELD_MAPPING)?);
        if let PinningLoad::Degraded { cause, .. } = &pinning {
            tracing::warn!(namespace = %namespace, cause = %cause, "Ignoring malformed node pinning");
        }

        Ok(Self {
            namespace: namespace.to_string(),
            members,
            max_id,
            pinning,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Whether some member already uses `legacy_addr`
    pub fn has_address(&self, legacy_addr: &str) -> bool {
        self.members.iter().any(|m| m.legacy_addr == legacy_addr)
    }

    /// Highest allocated ID, `None` when nothing was ever allocated
    pub fn max_id(&self) -> Option<u32> {
        self.max_id
    }

    pub fn node_pinning(&self) -> &NodePinning {
        self.pinning.mapping()
    }

    /// The node pinning load result, with its degradation cause if any
    pub fn pinning_load(&self) -> &PinningLoad {
        &self.pinning
    }

    /// Next free ID; fails once the ID space is exhausted rather than wrapping
    fn next_id(&self) -> Result<u32> {
        match self.max_id {
            None => Ok(0),
            Some(max) => max.checked_add(1).ok_or_else(|| Error::InvalidConfiguration {
                field: FIELD_MAX_ID.into(),
                reason: format!("member ID space exhausted at {}", max),
            }),
        }
    }

    /// Reserve the next ID
    pub fn allocate_id(&mut self) -> Result<u32> {
        let id = self.next_id()?;
        self.max_id = Some(id);
        Ok(id)
    }

    /// Name the next allocated member will get
    pub fn next_member_name(&self) -> Result<String> {
        self.next_id().map(index_to_name)
    }

    /// Allocate an ID for a new member at `legacy_addr` and add it
    pub fn add_member(
        &mut self,
        legacy_addr: impl Into<String>,
        modern_addr: Option<String>,
    ) -> Result<Member> {
        if self.members.len() >= MON_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "members".into(),
                reason: format!("at most {} members are supported", MON_COUNT_MAX),
            });
        }

        let name = self.next_member_name()?;
        if self.member(&name).is_some() {
            return Err(Error::internal(format!(
                "allocated name {} is already in use",
                name
            )));
        }

        let id = self.allocate_id()?;
        let mut member = Member::new(name, legacy_addr);
        debug_assert_eq!(member.id, Some(id));
        member.modern_addr = modern_addr;
        self.members.push(member.clone());

        tracing::info!(
            namespace = %self.namespace,
            member = %member.name,
            id,
            addr = %member.legacy_addr,
            "Added quorum member"
        );
        Ok(member)
    }

    /// Record the node a member runs on
    pub fn pin(&mut self, member: &str, node: NodeInfo) {
        let mut mapping = std::mem::take(&mut self.pinning).into_mapping();
        mapping.pin(member, node);
        self.pinning = PinningLoad::Ok(mapping);
    }

    /// Space-joined member names
    pub fn quorum_member_list(&self) -> String {
        self.members
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Comma-joined dual-protocol address groups, one per member
    pub fn quorum_address_directory(&self) -> String {
        self.members
            .iter()
            .map(Member::address_group)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Record holding members, counter and node pinning
    pub fn to_record(&self) -> Result<Record> {
        let counter = self
            .max_id
            .map_or_else(|| NO_ID_ALLOCATED.to_string(), |id| id.to_string());
        Ok(Record::new()
            .with(FIELD_DIRECTORY, member::serialize_directory(&self.members))
            .with(FIELD_MAX_ID, counter)
            .with(FIELD_MAPPING, self.node_pinning().to_json()?))
    }

    /// Persist members, counter and node pinning in one record write
    pub async fn save(&self, store: &dyn RecordStore) -> Result<()> {
        let record = self.to_record()?;
        store.upsert(&Self::key(&self.namespace), &record).await?;
        tracing::debug!(
            namespace = %self.namespace,
            members = self.members.len(),
            max_id = ?self.max_id,
            "Saved membership"
        );
        Ok(())
    }
}

/// Parse the persisted counter; absent or negative means nothing allocated
fn parse_counter(text: Option<&str>) -> Result<Option<u32>> {
    let text = match text.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(text) => text,
    };
    let value: i64 = text
        .parse()
        .map_err(|e| Error::parse(FIELD_MAX_ID, format!("{:?}: {}", text, e)))?;
    if value < 0 {
        return Ok(None);
    }
    u32::try_from(value)
        .map(Some)
        .map_err(|_| Error::parse(FIELD_MAX_ID, format!("{} is out of range", value)))
}
