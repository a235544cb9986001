//! Group and member records, mutation options and name rules.

use crate::core::primitives::Address;
use crate::error::{constants, ProtocolError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expiration of a member without an extra record: never expires.
pub const MAX_EXPIRATION: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

/// Where a group was created and which side is allowed to mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Created on this chain
    Origin,
    /// Created on, or mirrored to, the foreign chain
    CrossChain,
    /// Outbound mirror sent, awaiting the ack
    MirrorPending,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::Origin => "SOURCE_TYPE_ORIGIN",
            SourceType::CrossChain => "SOURCE_TYPE_CROSS_CHAIN",
            SourceType::MirrorPending => "SOURCE_TYPE_MIRROR_PENDING",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: u64,
    pub owner: Address,
    pub group_name: String,
    pub source_type: SourceType,
    pub extra: String,
}

/// Membership relation as stored by a [`crate::membership::store::MemberStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: u64,
    pub group_id: u64,
    pub member: Address,
}

/// Optional per-member data kept beside the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberExtra {
    pub expiration_time: DateTime<Utc>,
}

/// Member record joined with its expiration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: u64,
    pub group_id: u64,
    pub member: Address,
    pub expiration_time: DateTime<Utc>,
}

impl GroupMember {
    /// A member is expired once its expiration lies strictly before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time < now
    }
}

/// Member address paired with an expiration, as carried by messages and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgGroupMember {
    pub member: String,
    pub expiration_time: DateTime<Utc>,
}

impl MsgGroupMember {
    pub fn new(member: impl Into<String>, expiration_time: DateTime<Utc>) -> Self {
        Self {
            member: member.into(),
            expiration_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupOptions {
    pub members: Vec<String>,
    pub source_type: SourceType,
    pub extra: String,
    pub members_with_expiration: Vec<MsgGroupMember>,
}

impl Default for CreateGroupOptions {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            source_type: SourceType::Origin,
            extra: String::new(),
            members_with_expiration: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateGroupMemberOptions {
    pub source_type: SourceType,
    pub members_to_add: Vec<String>,
    pub members_to_delete: Vec<String>,
    pub members_with_expiration: Vec<MsgGroupMember>,
}

impl UpdateGroupMemberOptions {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            members_to_add: Vec::new(),
            members_to_delete: Vec::new(),
            members_with_expiration: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveGroupOptions {
    pub source_type: SourceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteGroupOptions {
    pub source_type: SourceType,
}

/// Convert a wire expiration in unix seconds.
///
/// `0` means the member never expires. Values past the representable range
/// clamp to [`MAX_EXPIRATION`].
pub fn expiration_from_unix(secs: u64) -> DateTime<Utc> {
    if secs == 0 {
        return MAX_EXPIRATION;
    }
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(MAX_EXPIRATION)
}

/// Check a group name: `min..=max` characters, no control characters.
pub fn check_valid_group_name(name: &str, min: usize, max: usize) -> Result<()> {
    let len = name.chars().count();
    if len < min || len > max {
        return Err(ProtocolError::InvalidRequest(format!(
            "{}: length {len} outside {min}..={max}",
            constants::ERR_INVALID_GROUP_NAME
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ProtocolError::InvalidRequest(format!(
            "{}: contains control characters",
            constants::ERR_INVALID_GROUP_NAME
        )));
    }
    Ok(())
}
