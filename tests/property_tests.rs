//! Property-based tests using proptest
//!
//! These tests check codec invariants across randomly generated packages:
//! decode inverts encode, encoding is canonical, and no input makes the
//! decoders panic.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use membership_protocol::core::abi::AbiPackage;
use membership_protocol::core::packet::Packet;
use membership_protocol::core::primitives::{Address, U256};
use membership_protocol::protocol::message::{
    CreateGroupSynPackage, DeleteGroupAckPackage, MirrorGroupSynPackage,
    UpdateGroupMemberAckPackage, UpdateGroupMemberSynPackage,
};
use membership_protocol::protocol::package::AckStatus;
use membership_protocol::protocol::schemas::{register_group_schemas_v1, register_group_schemas_v2};
use membership_protocol::protocol::PackageDispatcher;
use proptest::prelude::*;

fn any_address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::new)
}

fn any_u256() -> impl Strategy<Value = U256> {
    any::<[u8; 32]>().prop_map(U256::from_be_bytes)
}

fn any_status() -> impl Strategy<Value = AckStatus> {
    prop_oneof![Just(AckStatus::Success), Just(AckStatus::Fail)]
}

fn any_update_syn() -> impl Strategy<Value = UpdateGroupMemberSynPackage> {
    (
        any_address(),
        any_u256(),
        any::<u8>(),
        prop::collection::vec((any_address(), any::<u64>()), 0..24),
        prop::collection::vec(any::<u8>(), 0..2048),
    )
        .prop_map(|(operator, group_id, operation_type, members, extra_data)| {
            let (members, member_expiration) = members.into_iter().unzip();
            UpdateGroupMemberSynPackage {
                operator,
                group_id,
                operation_type,
                members,
                extra_data,
                member_expiration,
            }
        })
}

// Property: the v2 member update survives encode/decode, including empty lists
proptest! {
    #[test]
    fn prop_update_member_syn_roundtrip(pack in any_update_syn()) {
        let bytes = pack.encode_abi();
        prop_assert_eq!(bytes.len() % 32, 0);
        let decoded = UpdateGroupMemberSynPackage::decode_abi(&bytes).expect("decode should not fail");
        prop_assert_eq!(decoded, pack);
    }
}

// Property: re-encoding a decoded package reproduces the canonical bytes
proptest! {
    #[test]
    fn prop_update_member_ack_canonical(
        status in any_status(),
        id in any_u256(),
        operator in any_address(),
        operation_type in any::<u8>(),
        members in prop::collection::vec(any_address(), 0..24),
        extra_data in prop::collection::vec(any::<u8>(), 0..300),
    ) {
        let bytes = UpdateGroupMemberAckPackage { status, id, operator, operation_type, members, extra_data }
            .encode_abi();
        let decoded = UpdateGroupMemberAckPackage::decode_abi(&bytes).expect("decode should not fail");
        prop_assert_eq!(decoded.encode_abi(), bytes);
    }
}

// Property: strings of any valid UTF-8 content round-trip
proptest! {
    #[test]
    fn prop_create_group_syn_roundtrip(
        creator in any_address(),
        group_name in ".{0,80}",
        extra_data in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let pack = CreateGroupSynPackage { creator, group_name, extra_data };
        let decoded = CreateGroupSynPackage::decode_abi(&pack.encode_abi()).expect("decode should not fail");
        prop_assert_eq!(decoded, pack);
    }
}

// Property: uint256 fields hold the full range
proptest! {
    #[test]
    fn prop_static_and_u256_roundtrip(id in any_u256(), owner in any_address(), status in any_status()) {
        let syn = MirrorGroupSynPackage { id, owner };
        prop_assert_eq!(MirrorGroupSynPackage::decode_abi(&syn.encode_abi()).unwrap(), syn);

        let ack = DeleteGroupAckPackage { status, id, extra_data: vec![] };
        prop_assert_eq!(DeleteGroupAckPackage::decode_abi(&ack.encode_abi()).unwrap().id, id);
    }
}

// Property: arbitrary bytes never panic the dispatcher, whatever the package type
proptest! {
    #[test]
    fn prop_route_never_panics(
        raw in prop::collection::vec(any::<u8>(), 0..512),
        package_type in 0u8..4,
    ) {
        let dispatcher = PackageDispatcher::default();
        register_group_schemas_v1(&dispatcher, 6).unwrap();
        register_group_schemas_v2(&dispatcher, 6).unwrap();
        let _ = dispatcher.route(6, &raw, package_type);
    }
}

// Property: flipping one byte of a valid package never panics the decoder
proptest! {
    #[test]
    fn prop_mutated_package_never_panics(pack in any_update_syn(), index in any::<usize>(), byte in any::<u8>()) {
        let mut bytes = pack.encode_abi();
        let at = index % bytes.len();
        bytes[at] = byte;
        let _ = UpdateGroupMemberSynPackage::decode_abi(&bytes);
    }
}

// Property: relay frames round-trip with any header values
proptest! {
    #[test]
    fn prop_packet_roundtrip(
        channel in any::<u8>(),
        package_type in any::<u8>(),
        sequence in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..10000),
    ) {
        let packet = Packet::new(channel, package_type, sequence, payload);
        let decoded = Packet::from_bytes(&packet.to_bytes()).expect("Deserialization should not fail");
        prop_assert_eq!(decoded, packet);
    }
}
