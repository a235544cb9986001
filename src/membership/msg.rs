//! Same-chain group messages and their stateless checks.

use crate::config::LimitsConfig;
use crate::core::primitives::Address;
use crate::error::{constants, ProtocolError, Result};
use crate::membership::types::{check_valid_group_name, MsgGroupMember};
use serde::{Deserialize, Serialize};

fn parse_address(value: &str, role: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .map_err(|e| ProtocolError::InvalidAddress(format!("invalid {role} address ({e})")))
}

fn check_name(name: &str, limits: &LimitsConfig) -> Result<()> {
    check_valid_group_name(name, limits.min_group_name_len, limits.max_group_name_len)
}

fn check_member_limit(count: usize, limits: &LimitsConfig) -> Result<()> {
    if count > limits.max_members_per_message {
        return Err(ProtocolError::InvalidRequest(format!(
            "{}: {count} > {}",
            constants::ERR_MEMBER_LIMIT_EXCEEDED,
            limits.max_members_per_message
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateGroup {
    pub creator: String,
    pub group_name: String,
    pub members: Vec<String>,
    pub extra: String,
    pub members_with_expiration: Vec<MsgGroupMember>,
}

impl MsgCreateGroup {
    pub fn validate_basic(&self, limits: &LimitsConfig) -> Result<()> {
        parse_address(&self.creator, "creator")?;
        check_name(&self.group_name, limits)?;
        check_member_limit(
            self.members.len() + self.members_with_expiration.len(),
            limits,
        )?;
        if self.extra.len() > limits.max_extra_len {
            return Err(ProtocolError::InvalidRequest(format!(
                "{}: length {}, limit {}",
                constants::ERR_EXTRA_TOO_LONG,
                self.extra.len(),
                limits.max_extra_len
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateGroupResponse {
    pub group_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateGroupMember {
    pub operator: String,
    pub group_owner: String,
    pub group_name: String,
    pub members_to_add: Vec<String>,
    pub members_to_delete: Vec<String>,
    pub members_with_expiration: Vec<MsgGroupMember>,
}

impl MsgUpdateGroupMember {
    pub fn validate_basic(&self, limits: &LimitsConfig) -> Result<()> {
        parse_address(&self.operator, "operator")?;
        parse_address(&self.group_owner, "group owner")?;
        check_name(&self.group_name, limits)?;
        check_member_limit(
            self.members_to_add.len()
                + self.members_to_delete.len()
                + self.members_with_expiration.len(),
            limits,
        )?;

        let all_members = self
            .members_to_add
            .iter()
            .chain(&self.members_to_delete)
            .chain(self.members_with_expiration.iter().map(|m| &m.member));
        for member in all_members {
            parse_address(member, "member")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgLeaveGroup {
    pub member: String,
    pub group_owner: String,
    pub group_name: String,
}

impl MsgLeaveGroup {
    pub fn validate_basic(&self, limits: &LimitsConfig) -> Result<()> {
        parse_address(&self.member, "member")?;
        parse_address(&self.group_owner, "group owner")?;
        check_name(&self.group_name, limits)
    }
}

/// Delete a group owned by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeleteGroup {
    pub operator: String,
    pub group_name: String,
}

impl MsgDeleteGroup {
    pub fn validate_basic(&self, limits: &LimitsConfig) -> Result<()> {
        parse_address(&self.operator, "operator")?;
        check_name(&self.group_name, limits)
    }
}

/// Mirror an origin group to the foreign chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMirrorGroup {
    pub operator: String,
    pub group_name: String,
}

impl MsgMirrorGroup {
    pub fn validate_basic(&self, limits: &LimitsConfig) -> Result<()> {
        parse_address(&self.operator, "operator")?;
        check_name(&self.group_name, limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> String {
        Address::new([1u8; 20]).to_string()
    }

    #[test]
    fn test_create_group_limits() {
        let limits = LimitsConfig::default();
        let mut msg = MsgCreateGroup {
            creator: owner(),
            group_name: "team".to_string(),
            members: vec![owner(); 20],
            extra: String::new(),
            members_with_expiration: vec![],
        };
        assert!(msg.validate_basic(&limits).is_ok());

        msg.members.push(owner());
        assert!(matches!(
            msg.validate_basic(&limits),
            Err(ProtocolError::InvalidRequest(_))
        ));

        msg.members.clear();
        msg.extra = "x".repeat(513);
        assert!(msg.validate_basic(&limits).is_err());
    }

    #[test]
    fn test_update_rejects_bad_member() {
        let msg = MsgUpdateGroupMember {
            operator: owner(),
            group_owner: owner(),
            group_name: "team".to_string(),
            members_to_add: vec![],
            members_to_delete: vec!["0x12".to_string()],
            members_with_expiration: vec![],
        };
        assert!(matches!(
            msg.validate_basic(&LimitsConfig::default()),
            Err(ProtocolError::InvalidAddress(_))
        ));
    }
}
