//! # Group Channel Application, member expiration
//!
//! Wraps the launch [`GroupApp`] and replaces only the member update flow,
//! whose request now carries an expiration per member. Every other operation
//! is delegated unchanged.

use crate::context::BlockContext;
use crate::core::abi::AbiPackage;
use crate::core::primitives::U256;
use crate::error::Result;
use crate::membership::keeper::Keeper;
use crate::membership::types::{
    expiration_from_unix, MsgGroupMember, SourceType, UpdateGroupMemberOptions,
};
use crate::protocol::app::{
    lookup_group, member_strings, AppContext, CrossChainApplication, ExecuteResult, GroupApp,
};
use crate::protocol::message::{
    CrossChainPayload, UpdateGroupMemberAckPackage, UpdateGroupMemberSynPackage,
};
use crate::protocol::package::{
    AckStatus, CrossChainPackage, MemberOperation, PackageType, SchemaVersion,
    OPERATION_UPDATE_GROUP_MEMBER,
};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct GroupAppV2 {
    inner: GroupApp,
}

impl GroupAppV2 {
    pub fn new(inner: GroupApp) -> Self {
        Self { inner }
    }

    /// Translate a member update request into keeper options.
    ///
    /// Additions carry their expiration, `0` meaning never; deletions ignore it.
    fn update_options(
        operation: MemberOperation,
        pack: &UpdateGroupMemberSynPackage,
    ) -> UpdateGroupMemberOptions {
        let mut opts = UpdateGroupMemberOptions::new(SourceType::CrossChain);
        match operation {
            MemberOperation::Add => {
                opts.members_with_expiration = pack
                    .members
                    .iter()
                    .zip(&pack.member_expiration)
                    .map(|(member, &expiration)| {
                        MsgGroupMember::new(member.to_string(), expiration_from_unix(expiration))
                    })
                    .collect();
            }
            MemberOperation::Delete => opts.members_to_delete = member_strings(&pack.members),
        }
        opts
    }

    #[instrument(skip_all, fields(operator = %pack.operator, group_id = %pack.group_id))]
    fn handle_update_group_member_syn(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        pack: UpdateGroupMemberSynPackage,
    ) -> ExecuteResult {
        let outcome: Result<u64> = pack.validate_basic().and_then(|operation| {
            let group_id = lookup_group(keeper, &pack.group_id)?;
            let opts = Self::update_options(operation, &pack);
            keeper.update_group_member(pack.operator, group_id, opts, block.time)?;
            Ok(group_id)
        });

        let result = match outcome {
            Ok(group_id) => {
                debug!(group_id, members = pack.members.len(), "cross-chain member update applied");
                ExecuteResult::ok(
                    UpdateGroupMemberAckPackage {
                        status: AckStatus::Success,
                        id: U256::from(group_id),
                        operator: pack.operator,
                        operation_type: pack.operation_type,
                        members: pack.members,
                        extra_data: pack.extra_data,
                    }
                    .encode_abi(),
                )
            }
            Err(err) => ExecuteResult::fail(
                UpdateGroupMemberAckPackage::fail(pack.operator, pack.extra_data).encode_abi(),
                err,
            ),
        };
        wrap_update_ack(result)
    }
}

fn wrap_update_ack(mut result: ExecuteResult) -> ExecuteResult {
    result.payload = CrossChainPackage::new(OPERATION_UPDATE_GROUP_MEMBER, result.payload).serialize();
    result
}

impl CrossChainApplication for GroupAppV2 {
    fn name(&self) -> &'static str {
        "group"
    }

    fn schema_version(&self) -> SchemaVersion {
        SchemaVersion::V2
    }

    fn execute_syn_package(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        ctx: &AppContext,
        raw: &[u8],
    ) -> ExecuteResult {
        let decoded = match self.inner.route(ctx, raw, PackageType::Syn, self.schema_version()) {
            // member updates encoded before the upgrade may still be in flight
            Err(err) if raw.first() == Some(&OPERATION_UPDATE_GROUP_MEMBER) => {
                debug!(sequence = ctx.sequence, error = %err, "retrying member update with launch schema");
                self.inner
                    .route(ctx, raw, PackageType::Syn, SchemaVersion::V1)
                    .map_err(|_| err)
            }
            other => other,
        };

        match decoded {
            Ok(CrossChainPayload::UpdateGroupMemberSyn(pack)) => {
                self.handle_update_group_member_syn(keeper, block, pack)
            }
            Ok(payload) => self.inner.handle_syn_payload(keeper, block, payload),
            Err(err) => self.inner.undecodable(ctx, raw, PackageType::Syn, err),
        }
    }

    fn execute_ack_package(
        &self,
        keeper: &mut Keeper,
        _block: &BlockContext,
        ctx: &AppContext,
        raw: &[u8],
    ) -> ExecuteResult {
        match self.inner.decode(ctx, raw, PackageType::Ack, self.schema_version()) {
            Ok(payload) => self.inner.handle_ack_payload(keeper, payload),
            Err(result) => result,
        }
    }

    fn execute_fail_ack_package(
        &self,
        keeper: &mut Keeper,
        _block: &BlockContext,
        ctx: &AppContext,
        raw: &[u8],
    ) -> ExecuteResult {
        match self.inner.decode(ctx, raw, PackageType::FailAck, self.schema_version()) {
            Ok(payload) => self.inner.handle_fail_ack_payload(keeper, payload),
            Err(result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::primitives::Address;
    use crate::error::ProtocolError;
    use crate::membership::types::{CreateGroupOptions, MAX_EXPIRATION};
    use crate::protocol::dispatcher::PackageDispatcher;
    use crate::protocol::message::UpdateGroupMemberSynPackageV1;
    use crate::protocol::schemas::{register_group_schemas_v1, register_group_schemas_v2};

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn app() -> GroupAppV2 {
        let dispatcher = PackageDispatcher::default();
        register_group_schemas_v1(&dispatcher, 6).unwrap();
        register_group_schemas_v2(&dispatcher, 6).unwrap();
        GroupAppV2::new(GroupApp::new(dispatcher))
    }

    fn cross_chain_group(keeper: &mut Keeper) -> u64 {
        let opts = CreateGroupOptions {
            source_type: SourceType::CrossChain,
            ..CreateGroupOptions::default()
        };
        keeper.create_group(addr(1), "bridge", opts).unwrap()
    }

    fn envelope(pack: &UpdateGroupMemberSynPackage) -> Vec<u8> {
        CrossChainPackage::new(OPERATION_UPDATE_GROUP_MEMBER, pack.encode_abi()).serialize()
    }

    fn ack_of(result: &ExecuteResult) -> UpdateGroupMemberAckPackage {
        let envelope = CrossChainPackage::deserialize(&result.payload).unwrap();
        UpdateGroupMemberAckPackage::decode_abi(&envelope.package).unwrap()
    }

    #[test]
    fn test_add_with_expiration() {
        let app = app();
        let mut keeper = Keeper::default();
        let id = cross_chain_group(&mut keeper);
        let block = BlockContext::at_unix(5, 100);
        let ctx = AppContext {
            channel_id: 6,
            sequence: 0,
        };
        let pack = UpdateGroupMemberSynPackage {
            operator: addr(1),
            group_id: U256::from(id),
            operation_type: MemberOperation::Add.as_u8(),
            members: vec![addr(2), addr(3)],
            extra_data: b"x".to_vec(),
            member_expiration: vec![0, 1000],
        };

        let result = app.execute_syn_package(&mut keeper, &block, &ctx, &envelope(&pack));
        assert!(result.is_ok());
        let ack = ack_of(&result);
        assert_eq!(ack.status, AckStatus::Success);
        assert_eq!(ack.members, pack.members);
        assert_eq!(ack.id, U256::from(id));

        assert_eq!(
            keeper.get_group_member(id, &addr(2)).unwrap().expiration_time,
            MAX_EXPIRATION
        );
        assert_eq!(
            keeper.get_group_member(id, &addr(3)).unwrap().expiration_time,
            expiration_from_unix(1000)
        );
    }

    #[test]
    fn test_unknown_group_fail_ack_echoes_request() {
        let app = app();
        let mut keeper = Keeper::default();
        let block = BlockContext::at_unix(5, 100);
        let ctx = AppContext {
            channel_id: 6,
            sequence: 0,
        };
        let pack = UpdateGroupMemberSynPackage {
            operator: addr(1),
            group_id: U256::MAX,
            operation_type: MemberOperation::Delete.as_u8(),
            members: vec![addr(2)],
            extra_data: b"callback".to_vec(),
            member_expiration: vec![0],
        };

        let result = app.execute_syn_package(&mut keeper, &block, &ctx, &envelope(&pack));
        assert!(matches!(result.err, Some(ProtocolError::NotFound(_))));
        let ack = ack_of(&result);
        assert_eq!(ack.status, AckStatus::Fail);
        assert_eq!(ack.operator, addr(1));
        assert_eq!(ack.extra_data, b"callback".to_vec());
        assert!(keeper.events().is_empty());
    }

    #[test]
    fn test_launch_schema_update_still_decoded() {
        let app = app();
        let mut keeper = Keeper::default();
        let id = cross_chain_group(&mut keeper);
        let block = BlockContext::at_unix(5, 100);
        let ctx = AppContext {
            channel_id: 6,
            sequence: 3,
        };
        let pack = UpdateGroupMemberSynPackageV1 {
            operator: addr(1),
            group_id: U256::from(id),
            operation_type: MemberOperation::Add.as_u8(),
            members: vec![addr(4)],
            extra_data: vec![],
        };
        let raw = CrossChainPackage::new(OPERATION_UPDATE_GROUP_MEMBER, pack.encode_abi()).serialize();

        let result = app.execute_syn_package(&mut keeper, &block, &ctx, &raw);
        assert!(result.is_ok());
        assert_eq!(ack_of(&result).status, AckStatus::Success);
        assert_eq!(
            keeper.get_group_member(id, &addr(4)).unwrap().expiration_time,
            MAX_EXPIRATION
        );
    }

    #[test]
    fn test_garbage_update_reports_v2_error() {
        let app = app();
        let mut keeper = Keeper::default();
        let block = BlockContext::at_unix(5, 100);
        let ctx = AppContext {
            channel_id: 6,
            sequence: 0,
        };
        let raw = vec![OPERATION_UPDATE_GROUP_MEMBER, 0xFF];

        let result = app.execute_syn_package(&mut keeper, &block, &ctx, &raw);
        assert!(matches!(result.err, Some(ProtocolError::MalformedPackage(_))));
        assert_eq!(ack_of(&result).status, AckStatus::Fail);
    }
}
