//! # Group Channel Application
//!
//! Executes decoded group packages against the keeper and produces the
//! acknowledgement sent back over the channel.
//!
//! Every inbound syn gets exactly one ack. Validation and state errors become
//! fail acks carrying the error in [`ExecuteResult::err`]; the keeper state
//! is left untouched in that case.

use crate::config::LimitsConfig;
use crate::context::BlockContext;
use crate::core::abi::AbiPackage;
use crate::core::primitives::{Address, U256};
use crate::error::{constants, ProtocolError, Result};
use crate::membership::keeper::Keeper;
use crate::membership::types::{
    CreateGroupOptions, DeleteGroupOptions, SourceType, UpdateGroupMemberOptions,
};
use crate::protocol::dispatcher::PackageDispatcher;
use crate::protocol::message::{
    fail_ack_for, CreateGroupAckPackage, CreateGroupSynPackage, CrossChainPayload,
    DeleteGroupAckPackage, DeleteGroupSynPackage, UpdateGroupMemberAckPackage,
    UpdateGroupMemberSynPackageV1,
};
use crate::protocol::package::{
    AckStatus, ChannelId, CrossChainPackage, MemberOperation, PackageType, SchemaVersion,
    OPERATION_UPDATE_GROUP_MEMBER,
};
use tracing::{debug, error, instrument, warn};

/// Where a package came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppContext {
    pub channel_id: ChannelId,
    pub sequence: u64,
}

/// Outcome of executing one package.
///
/// `payload` is the enveloped ack to send back, empty when nothing is sent.
#[derive(Debug, Default)]
pub struct ExecuteResult {
    pub payload: Vec<u8>,
    pub err: Option<ProtocolError>,
}

impl ExecuteResult {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self { payload, err: None }
    }

    pub fn fail(payload: Vec<u8>, err: ProtocolError) -> Self {
        Self {
            payload,
            err: Some(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }

    /// Wrap a bare ABI ack into the `[operation type][payload]` envelope.
    fn enveloped(mut self, operation_type: u8) -> Self {
        if !self.payload.is_empty() {
            self.payload = CrossChainPackage::new(operation_type, self.payload).serialize();
        }
        self
    }
}

/// Handler bound to a cross-chain channel.
pub trait CrossChainApplication: Send + Sync {
    fn name(&self) -> &'static str;

    /// Newest schema version this handler decodes with.
    fn schema_version(&self) -> SchemaVersion;

    fn execute_syn_package(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        ctx: &AppContext,
        raw: &[u8],
    ) -> ExecuteResult;

    fn execute_ack_package(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        ctx: &AppContext,
        raw: &[u8],
    ) -> ExecuteResult;

    fn execute_fail_ack_package(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        ctx: &AppContext,
        raw: &[u8],
    ) -> ExecuteResult;
}

/// Resolve a wire group id to a local group. Ids beyond `u64` never exist.
pub(crate) fn lookup_group(keeper: &Keeper, id: &U256) -> Result<u64> {
    id.to_u64()
        .and_then(|id| keeper.get_group_info_by_id(id))
        .map(|group| group.id)
        .ok_or_else(|| ProtocolError::NotFound(format!("{}: id {id}", constants::ERR_NO_SUCH_GROUP)))
}

pub(crate) fn member_strings(members: &[Address]) -> Vec<String> {
    members.iter().map(Address::to_string).collect()
}

/// Group handler for the launch schemas.
#[derive(Debug, Clone)]
pub struct GroupApp {
    dispatcher: PackageDispatcher,
    limits: LimitsConfig,
}

impl GroupApp {
    pub fn new(dispatcher: PackageDispatcher) -> Self {
        Self::with_limits(dispatcher, LimitsConfig::default())
    }

    /// Handler that checks inbound requests against `limits`, the same
    /// bounds the same-chain message server applies.
    pub fn with_limits(dispatcher: PackageDispatcher, limits: LimitsConfig) -> Self {
        Self { dispatcher, limits }
    }

    pub(crate) fn route(
        &self,
        ctx: &AppContext,
        raw: &[u8],
        package_type: PackageType,
        version: SchemaVersion,
    ) -> Result<CrossChainPayload> {
        self.dispatcher
            .route_at(ctx.channel_id, raw, package_type as u8, version)
    }

    /// Decode an inbound package. A syn that cannot be decoded is answered
    /// with a bare fail ack for its operation type.
    pub(crate) fn decode(
        &self,
        ctx: &AppContext,
        raw: &[u8],
        package_type: PackageType,
        version: SchemaVersion,
    ) -> std::result::Result<CrossChainPayload, ExecuteResult> {
        self.route(ctx, raw, package_type, version)
            .map_err(|err| self.undecodable(ctx, raw, package_type, err))
    }

    pub(crate) fn undecodable(
        &self,
        ctx: &AppContext,
        raw: &[u8],
        package_type: PackageType,
        err: ProtocolError,
    ) -> ExecuteResult {
        error!(
            channel = ctx.channel_id,
            sequence = ctx.sequence,
            %package_type,
            payload = %hex::encode(raw),
            error = %err,
            "deserialize group cross chain package error"
        );
        if package_type != PackageType::Syn {
            return ExecuteResult {
                payload: Vec::new(),
                err: Some(err),
            };
        }
        let operation_type = raw.first().copied().unwrap_or(OPERATION_UPDATE_GROUP_MEMBER);
        ExecuteResult::fail(fail_ack_for(operation_type), err).enveloped(operation_type)
    }

    /// Execute a decoded syn and envelope its ack.
    pub(crate) fn handle_syn_payload(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        payload: CrossChainPayload,
    ) -> ExecuteResult {
        let operation_type = payload.operation_type();
        let result = match payload {
            CrossChainPayload::MirrorGroupSyn(pack) => {
                error!(id = %pack.id, owner = %pack.owner, "received mirror group syn package");
                ExecuteResult::default()
            }
            CrossChainPayload::CreateGroupSyn(pack) => self.handle_create_group_syn(keeper, pack),
            CrossChainPayload::DeleteGroupSyn(pack) => {
                self.handle_delete_group_syn(keeper, block, pack)
            }
            CrossChainPayload::UpdateGroupMemberSynV1(pack) => {
                self.handle_update_group_member_syn_v1(keeper, block, pack)
            }
            other => {
                warn!(operation_type, "unexpected syn payload {:?}", other);
                ExecuteResult::fail(
                    fail_ack_for(operation_type),
                    ProtocolError::malformed(constants::ERR_INVALID_CROSS_CHAIN_PACKAGE),
                )
            }
        };
        result.enveloped(operation_type)
    }

    /// Acks for operations this chain originated. Only mirroring awaits one.
    pub(crate) fn handle_ack_payload(
        &self,
        keeper: &mut Keeper,
        payload: CrossChainPayload,
    ) -> ExecuteResult {
        match payload {
            CrossChainPayload::MirrorGroupAck(pack) => {
                let resolved = lookup_group(keeper, &pack.id)
                    .and_then(|id| keeper.resolve_mirror(id, pack.status == AckStatus::Success));
                match resolved {
                    Ok(()) => ExecuteResult::default(),
                    Err(err) => {
                        warn!(id = %pack.id, error = %err, "mirror group ack not applied");
                        ExecuteResult {
                            payload: Vec::new(),
                            err: Some(err),
                        }
                    }
                }
            }
            other => {
                debug!(operation_type = other.operation_type(), "ack ignored");
                ExecuteResult::default()
            }
        }
    }

    /// A fail ack carries back the syn we sent.
    pub(crate) fn handle_fail_ack_payload(
        &self,
        keeper: &mut Keeper,
        payload: CrossChainPayload,
    ) -> ExecuteResult {
        match payload {
            CrossChainPayload::MirrorGroupSyn(pack) => {
                match lookup_group(keeper, &pack.id).and_then(|id| keeper.resolve_mirror(id, false))
                {
                    Ok(()) => ExecuteResult::default(),
                    Err(err) => ExecuteResult {
                        payload: Vec::new(),
                        err: Some(err),
                    },
                }
            }
            other => {
                debug!(operation_type = other.operation_type(), "fail ack ignored");
                ExecuteResult::default()
            }
        }
    }

    #[instrument(skip_all, fields(creator = %pack.creator, group = %pack.group_name))]
    fn handle_create_group_syn(&self, keeper: &mut Keeper, pack: CreateGroupSynPackage) -> ExecuteResult {
        let fail = |pack: CreateGroupSynPackage, err| {
            ExecuteResult::fail(
                CreateGroupAckPackage {
                    status: AckStatus::Fail,
                    id: U256::ZERO,
                    creator: pack.creator,
                    extra_data: pack.extra_data,
                }
                .encode_abi(),
                err,
            )
        };

        if let Err(err) = pack.validate_basic(&self.limits) {
            return fail(pack, err);
        }
        let opts = CreateGroupOptions {
            source_type: SourceType::CrossChain,
            ..CreateGroupOptions::default()
        };
        match keeper.create_group(pack.creator, &pack.group_name, opts) {
            Ok(id) => ExecuteResult::ok(
                CreateGroupAckPackage {
                    status: AckStatus::Success,
                    id: U256::from(id),
                    creator: pack.creator,
                    extra_data: pack.extra_data,
                }
                .encode_abi(),
            ),
            Err(err) => fail(pack, err),
        }
    }

    #[instrument(skip_all, fields(operator = %pack.operator, id = %pack.id))]
    fn handle_delete_group_syn(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        pack: DeleteGroupSynPackage,
    ) -> ExecuteResult {
        let outcome = pack.validate_basic().and_then(|()| {
            let group_id = lookup_group(keeper, &pack.id)?;
            keeper.delete_group_by_id(
                pack.operator,
                group_id,
                DeleteGroupOptions {
                    source_type: SourceType::CrossChain,
                },
                block.time,
            )
        });

        let status = if outcome.is_ok() {
            AckStatus::Success
        } else {
            AckStatus::Fail
        };
        let ack = DeleteGroupAckPackage {
            status,
            id: pack.id,
            extra_data: pack.extra_data,
        }
        .encode_abi();
        match outcome {
            Ok(_) => ExecuteResult::ok(ack),
            Err(err) => ExecuteResult::fail(ack, err),
        }
    }

    #[instrument(skip_all, fields(operator = %pack.operator, group_id = %pack.group_id))]
    fn handle_update_group_member_syn_v1(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        pack: UpdateGroupMemberSynPackageV1,
    ) -> ExecuteResult {
        let outcome = pack.validate_basic().and_then(|operation| {
            let group_id = lookup_group(keeper, &pack.group_id)?;
            let mut opts = UpdateGroupMemberOptions::new(SourceType::CrossChain);
            match operation {
                MemberOperation::Add => opts.members_to_add = member_strings(&pack.members),
                MemberOperation::Delete => opts.members_to_delete = member_strings(&pack.members),
            }
            keeper.update_group_member(pack.operator, group_id, opts, block.time)?;
            Ok(group_id)
        });

        match outcome {
            Ok(group_id) => ExecuteResult::ok(
                UpdateGroupMemberAckPackage {
                    status: AckStatus::Success,
                    id: U256::from(group_id),
                    operator: pack.operator,
                    operation_type: pack.operation_type,
                    members: pack.members,
                    extra_data: pack.extra_data,
                }
                .encode_abi(),
            ),
            Err(err) => ExecuteResult::fail(
                UpdateGroupMemberAckPackage::fail(pack.operator, pack.extra_data).encode_abi(),
                err,
            ),
        }
    }
}

impl CrossChainApplication for GroupApp {
    fn name(&self) -> &'static str {
        "group"
    }

    fn schema_version(&self) -> SchemaVersion {
        SchemaVersion::V1
    }

    fn execute_syn_package(
        &self,
        keeper: &mut Keeper,
        block: &BlockContext,
        ctx: &AppContext,
        raw: &[u8],
    ) -> ExecuteResult {
        match self.decode(ctx, raw, PackageType::Syn, self.schema_version()) {
            Ok(payload) => self.handle_syn_payload(keeper, block, payload),
            Err(result) => result,
        }
    }

    fn execute_ack_package(
        &self,
        keeper: &mut Keeper,
        _block: &BlockContext,
        ctx: &AppContext,
        raw: &[u8],
    ) -> ExecuteResult {
        match self.decode(ctx, raw, PackageType::Ack, self.schema_version()) {
            Ok(payload) => self.handle_ack_payload(keeper, payload),
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
        match self.decode(ctx, raw, PackageType::FailAck, self.schema_version()) {
            Ok(payload) => self.handle_fail_ack_payload(keeper, payload),
            Err(result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::types::CreateGroupOptions;
    use crate::protocol::package::OPERATION_CREATE_GROUP;
    use crate::protocol::schemas::register_group_schemas_v1;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn setup() -> (GroupApp, Keeper, BlockContext, AppContext) {
        let dispatcher = PackageDispatcher::default();
        register_group_schemas_v1(&dispatcher, 6).unwrap();
        (
            GroupApp::new(dispatcher),
            Keeper::default(),
            BlockContext::at_unix(10, 100),
            AppContext {
                channel_id: 6,
                sequence: 0,
            },
        )
    }

    #[test]
    fn test_cross_chain_create_group() {
        let (app, mut keeper, block, ctx) = setup();
        let syn = CreateGroupSynPackage {
            creator: addr(1),
            group_name: "bridge".to_string(),
            extra_data: b"cb".to_vec(),
        };
        let raw = CrossChainPackage::new(OPERATION_CREATE_GROUP, syn.encode_abi()).serialize();

        let result = app.execute_syn_package(&mut keeper, &block, &ctx, &raw);
        assert!(result.is_ok());
        let envelope = CrossChainPackage::deserialize(&result.payload).unwrap();
        let ack = CreateGroupAckPackage::decode_abi(&envelope.package).unwrap();
        assert_eq!(ack.status, AckStatus::Success);
        assert_eq!(ack.extra_data, b"cb".to_vec());
        let group = keeper.get_group_info(&addr(1), "bridge").unwrap();
        assert_eq!(group.source_type, SourceType::CrossChain);

        let again = app.execute_syn_package(&mut keeper, &block, &ctx, &raw);
        assert!(matches!(again.err, Some(ProtocolError::AlreadyExists(_))));
    }

    #[test]
    fn test_v1_update_rejects_origin_group() {
        let (app, mut keeper, block, ctx) = setup();
        let id = keeper
            .create_group(addr(1), "local", CreateGroupOptions::default())
            .unwrap();
        let syn = UpdateGroupMemberSynPackageV1 {
            operator: addr(1),
            group_id: U256::from(id),
            operation_type: 1,
            members: vec![addr(2)],
            extra_data: vec![],
        };
        let raw = CrossChainPackage::new(OPERATION_UPDATE_GROUP_MEMBER, syn.encode_abi()).serialize();

        let result = app.execute_syn_package(&mut keeper, &block, &ctx, &raw);
        assert!(matches!(result.err, Some(ProtocolError::SourceTypeMismatch)));
        assert!(keeper.get_group_member(id, &addr(2)).is_none());
    }

    #[test]
    fn test_undecodable_syn_gets_fail_ack() {
        let (app, mut keeper, block, ctx) = setup();
        let raw = [OPERATION_CREATE_GROUP, 0xFF, 0x00];

        let result = app.execute_syn_package(&mut keeper, &block, &ctx, &raw);
        assert!(matches!(result.err, Some(ProtocolError::MalformedPackage(_))));
        let envelope = CrossChainPackage::deserialize(&result.payload).unwrap();
        assert_eq!(envelope.operation_type, OPERATION_CREATE_GROUP);
        let ack = CreateGroupAckPackage::decode_abi(&envelope.package).unwrap();
        assert_eq!(ack.status, AckStatus::Fail);
    }
}
