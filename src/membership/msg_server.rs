//! # Message Server
//!
//! Same-chain transaction entry points. Every message is checked with
//! `validate_basic` before the keeper sees it; keeper errors are returned to
//! the caller with the mutation rolled back.

use crate::config::LimitsConfig;
use crate::context::BlockContext;
use crate::core::primitives::Address;
use crate::error::{constants, ProtocolError, Result};
use crate::membership::keeper::Keeper;
use crate::membership::msg::{
    MsgCreateGroup, MsgCreateGroupResponse, MsgDeleteGroup, MsgLeaveGroup, MsgUpdateGroupMember,
};
use crate::membership::types::{
    CreateGroupOptions, DeleteGroupOptions, LeaveGroupOptions, SourceType,
    UpdateGroupMemberOptions,
};
use tracing::instrument;

pub struct MsgServer<'a> {
    keeper: &'a mut Keeper,
    limits: &'a LimitsConfig,
}

impl<'a> MsgServer<'a> {
    pub fn new(keeper: &'a mut Keeper, limits: &'a LimitsConfig) -> Self {
        Self { keeper, limits }
    }

    #[instrument(skip_all, fields(creator = %msg.creator, group = %msg.group_name))]
    pub fn create_group(&mut self, msg: MsgCreateGroup) -> Result<MsgCreateGroupResponse> {
        msg.validate_basic(self.limits)?;
        let creator: Address = msg.creator.parse()?;

        let group_id = self.keeper.create_group(
            creator,
            &msg.group_name,
            CreateGroupOptions {
                members: msg.members,
                source_type: SourceType::Origin,
                extra: msg.extra,
                members_with_expiration: msg.members_with_expiration,
            },
        )?;
        Ok(MsgCreateGroupResponse { group_id })
    }

    #[instrument(skip_all, fields(operator = %msg.operator, group = %msg.group_name))]
    pub fn update_group_member(
        &mut self,
        block: &BlockContext,
        msg: MsgUpdateGroupMember,
    ) -> Result<()> {
        msg.validate_basic(self.limits)?;
        let operator: Address = msg.operator.parse()?;
        let owner: Address = msg.group_owner.parse()?;

        let group_id = self
            .keeper
            .get_group_info(&owner, &msg.group_name)
            .map(|group| group.id)
            .ok_or_else(|| {
                ProtocolError::NotFound(format!(
                    "{}: {} owned by {owner}",
                    constants::ERR_NO_SUCH_GROUP,
                    msg.group_name
                ))
            })?;

        self.keeper.update_group_member(
            operator,
            group_id,
            UpdateGroupMemberOptions {
                source_type: SourceType::Origin,
                members_to_add: msg.members_to_add,
                members_to_delete: msg.members_to_delete,
                members_with_expiration: msg.members_with_expiration,
            },
            block.time,
        )
    }

    #[instrument(skip_all, fields(member = %msg.member, group = %msg.group_name))]
    pub fn leave_group(&mut self, msg: MsgLeaveGroup) -> Result<()> {
        msg.validate_basic(self.limits)?;
        let member: Address = msg.member.parse()?;
        let owner: Address = msg.group_owner.parse()?;

        self.keeper
            .leave_group(
                member,
                owner,
                &msg.group_name,
                LeaveGroupOptions {
                    source_type: SourceType::Origin,
                },
            )
            .map(|_| ())
    }

    #[instrument(skip_all, fields(operator = %msg.operator, group = %msg.group_name))]
    pub fn delete_group(&mut self, block: &BlockContext, msg: MsgDeleteGroup) -> Result<()> {
        msg.validate_basic(self.limits)?;
        let operator: Address = msg.operator.parse()?;

        self.keeper
            .delete_group(
                operator,
                operator,
                &msg.group_name,
                DeleteGroupOptions {
                    source_type: SourceType::Origin,
                },
                block.time,
            )
            .map(|_| ())
    }
}
