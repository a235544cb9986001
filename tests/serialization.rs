//! Event export through the multi-format serializer

#![allow(clippy::expect_used, clippy::unwrap_used)]

use membership_protocol::core::primitives::Address;
use membership_protocol::core::serialization::{MultiFormat, SerializationFormat};
use membership_protocol::error::ProtocolError;
use membership_protocol::membership::events::GroupEvent;
use membership_protocol::membership::types::{
    expiration_from_unix, CreateGroupOptions, MsgGroupMember, SourceType, UpdateGroupMemberOptions,
};
use membership_protocol::membership::Keeper;

fn addr(byte: u8) -> Address {
    Address::new([byte; 20])
}

/// Keeper holding a create and an update event, all with finite expirations.
fn keeper_with_events() -> Keeper {
    let mut keeper = Keeper::default();
    let opts = CreateGroupOptions {
        members_with_expiration: vec![MsgGroupMember::new(
            addr(2).to_string(),
            expiration_from_unix(1000),
        )],
        extra: "{\"tier\":1}".to_string(),
        ..CreateGroupOptions::default()
    };
    let id = keeper.create_group(addr(1), "exporters", opts).unwrap();

    let mut update = UpdateGroupMemberOptions::new(SourceType::Origin);
    update.members_to_delete = vec![addr(2).to_string()];
    keeper
        .update_group_member(addr(1), id, update, expiration_from_unix(10))
        .unwrap();
    keeper
}

#[test]
fn test_export_bincode_roundtrip() {
    let keeper = keeper_with_events();
    let exported = keeper.events().export(SerializationFormat::Bincode).unwrap();
    assert_eq!(exported.len(), 2);

    for (bytes, original) in exported.iter().zip(keeper.events().events()) {
        let (event, format) = GroupEvent::deserialize_with_header(bytes).unwrap();
        assert_eq!(format, SerializationFormat::Bincode);
        assert_eq!(&event, original);
    }
}

#[test]
fn test_export_json_is_readable() {
    let keeper = keeper_with_events();
    let exported = keeper.events().export(SerializationFormat::Json).unwrap();

    let text = std::str::from_utf8(&exported[0][1..]).unwrap();
    assert!(text.contains("GroupCreated"));
    assert!(text.contains("exporters"));
    assert!(text.contains(&addr(2).to_string()));

    let (event, _) = GroupEvent::deserialize_with_header(&exported[1]).unwrap();
    assert_eq!(event.kind(), "EventUpdateGroupMember");
    assert_eq!(event.group_id(), 1);
}

#[test]
fn test_drain_empties_manager() {
    let mut keeper = keeper_with_events();
    let drained = keeper.events_mut().drain();
    assert_eq!(drained.len(), 2);
    assert!(keeper.events().is_empty());
    assert!(keeper.events().export(SerializationFormat::Json).unwrap().is_empty());
}

#[test]
fn test_bad_header_rejected() {
    assert!(matches!(
        GroupEvent::deserialize_with_header(&[]),
        Err(ProtocolError::DeserializeError(_))
    ));
    assert!(matches!(
        GroupEvent::deserialize_with_header(&[0x7F, 1, 2, 3]),
        Err(ProtocolError::DeserializeError(_))
    ));
}

#[test]
fn test_truncated_bincode_rejected() {
    let event = GroupEvent::GroupDeleted {
        owner: addr(1),
        group_name: "exporters".to_string(),
        group_id: 4,
    };
    let bytes = event.serialize_with_header(SerializationFormat::Bincode).unwrap();
    assert!(GroupEvent::deserialize_with_header(&bytes[..bytes.len() - 3]).is_err());
}
