//! Read-only group queries.

use crate::core::primitives::{Address, U256};
use crate::error::{constants, ProtocolError, Result};
use crate::membership::keeper::Keeper;
use crate::membership::permission::{Action, Effect};
use crate::membership::types::{GroupInfo, GroupMember};
use chrono::{DateTime, Utc};

/// Page of groups returned by [`Querier::list_groups`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPage {
    pub groups: Vec<GroupInfo>,
    pub total: usize,
}

pub struct Querier<'a> {
    keeper: &'a Keeper,
}

impl<'a> Querier<'a> {
    pub fn new(keeper: &'a Keeper) -> Self {
        Self { keeper }
    }

    pub fn head_group(&self, group_owner: &str, group_name: &str) -> Result<GroupInfo> {
        let owner: Address = group_owner.parse()?;
        self.group_by_name(&owner, group_name).cloned()
    }

    /// Look a group up by its decimal id. Ids beyond the local range are not found.
    pub fn head_group_by_id(&self, group_id: &str) -> Result<GroupInfo> {
        let id: U256 = group_id.parse()?;
        id.to_u64()
            .and_then(|id| self.keeper.get_group_info_by_id(id))
            .cloned()
            .ok_or_else(|| {
                ProtocolError::NotFound(format!("{}: id {group_id}", constants::ERR_NO_SUCH_GROUP))
            })
    }

    /// Member record and expiration, returned even when already expired.
    pub fn head_group_member(
        &self,
        group_owner: &str,
        group_name: &str,
        member: &str,
    ) -> Result<GroupMember> {
        let member: Address = member.parse()?;
        let owner: Address = group_owner.parse()?;
        let group = self.group_by_name(&owner, group_name)?;
        self.keeper
            .get_group_member(group.id, &member)
            .ok_or_else(|| {
                ProtocolError::NotFound(format!(
                    "{}: {member} in group {}",
                    constants::ERR_NO_SUCH_GROUP_MEMBER,
                    group.id
                ))
            })
    }

    /// Groups of `group_owner` ordered by id, `limit` entries starting at `offset`.
    pub fn list_groups(&self, group_owner: &str, offset: usize, limit: usize) -> Result<GroupPage> {
        let owner: Address = group_owner.parse()?;
        let all = self.keeper.list_groups(&owner);
        let total = all.len();
        let groups = all.into_iter().skip(offset).take(limit).cloned().collect();
        Ok(GroupPage { groups, total })
    }

    pub fn verify_permission(
        &self,
        operator: &str,
        group_owner: &str,
        group_name: &str,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<Effect> {
        let operator: Address = operator.parse()?;
        let owner: Address = group_owner.parse()?;
        let group = self.group_by_name(&owner, group_name)?;
        Ok(self.keeper.verify_group_permission(group, &operator, action, now))
    }

    fn group_by_name(&self, owner: &Address, group_name: &str) -> Result<&'a GroupInfo> {
        self.keeper.get_group_info(owner, group_name).ok_or_else(|| {
            ProtocolError::NotFound(format!(
                "{}: {group_name} owned by {owner}",
                constants::ERR_NO_SUCH_GROUP
            ))
        })
    }
}
