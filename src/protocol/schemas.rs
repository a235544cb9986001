//! Decoder tables for the group channel.
//!
//! Each operation registers `[syn, ack, fail ack]` decoders. A fail ack
//! returns the original request, so it is decoded with the syn decoder.

use crate::core::abi::AbiPackage;
use crate::error::Result;
use crate::protocol::dispatcher::{DecoderSet, PackageDispatcher};
use crate::protocol::message::{
    CreateGroupAckPackage, CreateGroupSynPackage, CrossChainPayload, DeleteGroupAckPackage,
    DeleteGroupSynPackage, MirrorGroupAckPackage, MirrorGroupSynPackage,
    UpdateGroupMemberAckPackage, UpdateGroupMemberSynPackage, UpdateGroupMemberSynPackageV1,
};
use crate::protocol::package::{
    ChannelId, SchemaVersion, OPERATION_CREATE_GROUP, OPERATION_DELETE_GROUP,
    OPERATION_MIRROR_GROUP, OPERATION_UPDATE_GROUP_MEMBER,
};
use tracing::info;

fn mirror_syn(data: &[u8]) -> Result<CrossChainPayload> {
    MirrorGroupSynPackage::decode_abi(data).map(CrossChainPayload::MirrorGroupSyn)
}

fn mirror_ack(data: &[u8]) -> Result<CrossChainPayload> {
    MirrorGroupAckPackage::decode_abi(data).map(CrossChainPayload::MirrorGroupAck)
}

fn create_syn(data: &[u8]) -> Result<CrossChainPayload> {
    CreateGroupSynPackage::decode_abi(data).map(CrossChainPayload::CreateGroupSyn)
}

fn create_ack(data: &[u8]) -> Result<CrossChainPayload> {
    CreateGroupAckPackage::decode_abi(data).map(CrossChainPayload::CreateGroupAck)
}

fn delete_syn(data: &[u8]) -> Result<CrossChainPayload> {
    DeleteGroupSynPackage::decode_abi(data).map(CrossChainPayload::DeleteGroupSyn)
}

fn delete_ack(data: &[u8]) -> Result<CrossChainPayload> {
    DeleteGroupAckPackage::decode_abi(data).map(CrossChainPayload::DeleteGroupAck)
}

fn update_member_syn_v1(data: &[u8]) -> Result<CrossChainPayload> {
    UpdateGroupMemberSynPackageV1::decode_abi(data).map(CrossChainPayload::UpdateGroupMemberSynV1)
}

fn update_member_syn(data: &[u8]) -> Result<CrossChainPayload> {
    UpdateGroupMemberSynPackage::decode_abi(data).map(CrossChainPayload::UpdateGroupMemberSyn)
}

fn update_member_ack(data: &[u8]) -> Result<CrossChainPayload> {
    UpdateGroupMemberAckPackage::decode_abi(data).map(CrossChainPayload::UpdateGroupMemberAck)
}

const GROUP_SCHEMAS_V1: [(u8, DecoderSet); 4] = [
    (OPERATION_MIRROR_GROUP, [mirror_syn, mirror_ack, mirror_syn]),
    (OPERATION_CREATE_GROUP, [create_syn, create_ack, create_syn]),
    (OPERATION_DELETE_GROUP, [delete_syn, delete_ack, delete_syn]),
    (
        OPERATION_UPDATE_GROUP_MEMBER,
        [update_member_syn_v1, update_member_ack, update_member_syn_v1],
    ),
];

const GROUP_SCHEMAS_V2: [(u8, DecoderSet); 1] = [(
    OPERATION_UPDATE_GROUP_MEMBER,
    [update_member_syn, update_member_ack, update_member_syn],
)];

fn register_all(
    dispatcher: &PackageDispatcher,
    channel: ChannelId,
    version: SchemaVersion,
    schemas: &[(u8, DecoderSet)],
) -> Result<usize> {
    let mut added = 0;
    for (operation_type, decoders) in schemas {
        if dispatcher.register(channel, *operation_type, version, *decoders)? {
            added += 1;
        }
    }
    info!(channel, %version, added, "group schemas registered");
    Ok(added)
}

/// Register the launch schemas. Returns how many entries were new.
pub fn register_group_schemas_v1(dispatcher: &PackageDispatcher, channel: ChannelId) -> Result<usize> {
    register_all(dispatcher, channel, SchemaVersion::V1, &GROUP_SCHEMAS_V1)
}

/// Register the schemas introduced with member expiration.
pub fn register_group_schemas_v2(dispatcher: &PackageDispatcher, channel: ChannelId) -> Result<usize> {
    register_all(dispatcher, channel, SchemaVersion::V2, &GROUP_SCHEMAS_V2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_is_additive_and_idempotent() {
        let dispatcher = PackageDispatcher::default();
        assert_eq!(register_group_schemas_v1(&dispatcher, 6).unwrap(), 4);
        assert_eq!(register_group_schemas_v2(&dispatcher, 6).unwrap(), 1);
        assert_eq!(register_group_schemas_v2(&dispatcher, 6).unwrap(), 0);
        assert_eq!(dispatcher.entry_count().unwrap(), 5);
        assert_eq!(
            dispatcher
                .registered_versions(6, OPERATION_UPDATE_GROUP_MEMBER)
                .unwrap(),
            vec![SchemaVersion::V1, SchemaVersion::V2]
        );
    }
}
