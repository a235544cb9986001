//! # Group Channel Packages
//!
//! Every payload carried on the group channel, with its ABI schema.
//!
//! ## Schemas
//! ```text
//! MirrorGroupSyn          (uint256 Id, address Owner)
//! MirrorGroupAck          (uint8 Status, uint256 Id)
//! CreateGroupSyn          (address Creator, string GroupName, bytes ExtraData)
//! CreateGroupAck          (uint8 Status, uint256 Id, address Creator, bytes ExtraData)
//! DeleteGroupSyn          (address Operator, uint256 Id, bytes ExtraData)
//! DeleteGroupAck          (uint8 Status, uint256 Id, bytes ExtraData)
//! UpdateGroupMemberSyn v1 (address Operator, uint256 GroupId, uint8 OperationType,
//!                          address[] Members, bytes ExtraData)
//! UpdateGroupMemberSyn v2 (address Operator, uint256 GroupId, uint8 OperationType,
//!                          address[] Members, bytes ExtraData, uint64[] MemberExpiration)
//! UpdateGroupMemberAck    (uint8 Status, uint256 Id, address Operator, uint8 OperationType,
//!                          address[] Members, bytes ExtraData)
//! ```
//!
//! Decoded payloads are gathered in [`CrossChainPayload`] so handlers match on
//! one closed set of variants.

use crate::config::LimitsConfig;
use crate::core::abi::{AbiKind, AbiPackage, TupleDecoder, TupleEncoder};
use crate::core::primitives::{Address, U256};
use crate::error::{constants, ProtocolError, Result};
use crate::membership::types::check_valid_group_name;
use crate::protocol::package::{
    AckStatus, MemberOperation, OPERATION_CREATE_GROUP, OPERATION_DELETE_GROUP,
    OPERATION_MIRROR_GROUP, OPERATION_UPDATE_GROUP_MEMBER,
};

fn require_operator(address: &Address) -> Result<()> {
    if address.is_empty() {
        return Err(ProtocolError::InvalidAddress(
            constants::ERR_EMPTY_OPERATOR.to_string(),
        ));
    }
    Ok(())
}

fn require_members(members: &[Address]) -> Result<()> {
    if members.iter().any(Address::is_empty) {
        return Err(ProtocolError::InvalidAddress(
            constants::ERR_EMPTY_MEMBER.to_string(),
        ));
    }
    Ok(())
}

fn require_member_operation(operation_type: u8) -> Result<MemberOperation> {
    MemberOperation::from_u8(operation_type).ok_or_else(|| {
        ProtocolError::InvalidRequest(format!(
            "{}: {operation_type}",
            constants::ERR_INVALID_OPERATION_TYPE
        ))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorGroupSynPackage {
    pub id: U256,
    pub owner: Address,
}

impl AbiPackage for MirrorGroupSynPackage {
    const SCHEMA: &'static [AbiKind] = &[AbiKind::Uint256, AbiKind::Address];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .uint256(&self.id)
            .address(&self.owner)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            id: dec.uint256()?,
            owner: dec.address()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorGroupAckPackage {
    pub status: AckStatus,
    pub id: U256,
}

impl AbiPackage for MirrorGroupAckPackage {
    const SCHEMA: &'static [AbiKind] = &[AbiKind::Uint8, AbiKind::Uint256];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .uint8(self.status.as_u8())
            .uint256(&self.id)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            status: AckStatus::try_from(dec.uint8()?)?,
            id: dec.uint256()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupSynPackage {
    pub creator: Address,
    pub group_name: String,
    pub extra_data: Vec<u8>,
}

impl CreateGroupSynPackage {
    pub fn validate_basic(&self, limits: &LimitsConfig) -> Result<()> {
        require_operator(&self.creator)?;
        check_valid_group_name(
            &self.group_name,
            limits.min_group_name_len,
            limits.max_group_name_len,
        )
    }
}

impl AbiPackage for CreateGroupSynPackage {
    const SCHEMA: &'static [AbiKind] = &[AbiKind::Address, AbiKind::String, AbiKind::Bytes];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .address(&self.creator)
            .string(&self.group_name)
            .bytes(&self.extra_data)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            creator: dec.address()?,
            group_name: dec.string()?,
            extra_data: dec.bytes()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupAckPackage {
    pub status: AckStatus,
    pub id: U256,
    pub creator: Address,
    pub extra_data: Vec<u8>,
}

impl AbiPackage for CreateGroupAckPackage {
    const SCHEMA: &'static [AbiKind] = &[
        AbiKind::Uint8,
        AbiKind::Uint256,
        AbiKind::Address,
        AbiKind::Bytes,
    ];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .uint8(self.status.as_u8())
            .uint256(&self.id)
            .address(&self.creator)
            .bytes(&self.extra_data)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            status: AckStatus::try_from(dec.uint8()?)?,
            id: dec.uint256()?,
            creator: dec.address()?,
            extra_data: dec.bytes()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteGroupSynPackage {
    pub operator: Address,
    pub id: U256,
    pub extra_data: Vec<u8>,
}

impl DeleteGroupSynPackage {
    pub fn validate_basic(&self) -> Result<()> {
        require_operator(&self.operator)
    }
}

impl AbiPackage for DeleteGroupSynPackage {
    const SCHEMA: &'static [AbiKind] = &[AbiKind::Address, AbiKind::Uint256, AbiKind::Bytes];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .address(&self.operator)
            .uint256(&self.id)
            .bytes(&self.extra_data)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            operator: dec.address()?,
            id: dec.uint256()?,
            extra_data: dec.bytes()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteGroupAckPackage {
    pub status: AckStatus,
    pub id: U256,
    pub extra_data: Vec<u8>,
}

impl AbiPackage for DeleteGroupAckPackage {
    const SCHEMA: &'static [AbiKind] = &[AbiKind::Uint8, AbiKind::Uint256, AbiKind::Bytes];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .uint8(self.status.as_u8())
            .uint256(&self.id)
            .bytes(&self.extra_data)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            status: AckStatus::try_from(dec.uint8()?)?,
            id: dec.uint256()?,
            extra_data: dec.bytes()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

/// Member update request without expirations, as sent before the upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateGroupMemberSynPackageV1 {
    pub operator: Address,
    pub group_id: U256,
    pub operation_type: u8,
    pub members: Vec<Address>,
    pub extra_data: Vec<u8>,
}

impl UpdateGroupMemberSynPackageV1 {
    pub fn validate_basic(&self) -> Result<MemberOperation> {
        let operation = require_member_operation(self.operation_type)?;
        require_operator(&self.operator)?;
        require_members(&self.members)?;
        Ok(operation)
    }
}

impl AbiPackage for UpdateGroupMemberSynPackageV1 {
    const SCHEMA: &'static [AbiKind] = &[
        AbiKind::Address,
        AbiKind::Uint256,
        AbiKind::Uint8,
        AbiKind::AddressArray,
        AbiKind::Bytes,
    ];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .address(&self.operator)
            .uint256(&self.group_id)
            .uint8(self.operation_type)
            .address_array(&self.members)
            .bytes(&self.extra_data)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            operator: dec.address()?,
            group_id: dec.uint256()?,
            operation_type: dec.uint8()?,
            members: dec.address_array()?,
            extra_data: dec.bytes()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

/// Member update request; each member carries an expiration in unix seconds,
/// `0` meaning "never expires".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateGroupMemberSynPackage {
    pub operator: Address,
    pub group_id: U256,
    pub operation_type: u8,
    pub members: Vec<Address>,
    pub extra_data: Vec<u8>,
    pub member_expiration: Vec<u64>,
}

impl UpdateGroupMemberSynPackage {
    /// Stateless checks, run before any state is read.
    pub fn validate_basic(&self) -> Result<MemberOperation> {
        let operation = require_member_operation(self.operation_type)?;
        require_operator(&self.operator)?;
        require_members(&self.members)?;
        if self.members.len() != self.member_expiration.len() {
            return Err(ProtocolError::InvalidRequest(format!(
                "{}: {} members, {} expirations",
                constants::ERR_MEMBER_EXPIRATION_MISMATCH,
                self.members.len(),
                self.member_expiration.len()
            )));
        }
        Ok(operation)
    }
}

impl AbiPackage for UpdateGroupMemberSynPackage {
    const SCHEMA: &'static [AbiKind] = &[
        AbiKind::Address,
        AbiKind::Uint256,
        AbiKind::Uint8,
        AbiKind::AddressArray,
        AbiKind::Bytes,
        AbiKind::Uint64Array,
    ];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .address(&self.operator)
            .uint256(&self.group_id)
            .uint8(self.operation_type)
            .address_array(&self.members)
            .bytes(&self.extra_data)
            .uint64_array(&self.member_expiration)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            operator: dec.address()?,
            group_id: dec.uint256()?,
            operation_type: dec.uint8()?,
            members: dec.address_array()?,
            extra_data: dec.bytes()?,
            member_expiration: dec.uint64_array()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateGroupMemberAckPackage {
    pub status: AckStatus,
    pub id: U256,
    pub operator: Address,
    pub operation_type: u8,
    pub members: Vec<Address>,
    pub extra_data: Vec<u8>,
}

impl UpdateGroupMemberAckPackage {
    /// Fail ack echoing the request's operator and extra data.
    pub fn fail(operator: Address, extra_data: Vec<u8>) -> Self {
        Self {
            status: AckStatus::Fail,
            id: U256::ZERO,
            operator,
            operation_type: 0,
            members: Vec::new(),
            extra_data,
        }
    }
}

impl AbiPackage for UpdateGroupMemberAckPackage {
    const SCHEMA: &'static [AbiKind] = &[
        AbiKind::Uint8,
        AbiKind::Uint256,
        AbiKind::Address,
        AbiKind::Uint8,
        AbiKind::AddressArray,
        AbiKind::Bytes,
    ];

    fn encode_abi(&self) -> Vec<u8> {
        TupleEncoder::new(Self::SCHEMA)
            .uint8(self.status.as_u8())
            .uint256(&self.id)
            .address(&self.operator)
            .uint8(self.operation_type)
            .address_array(&self.members)
            .bytes(&self.extra_data)
            .finish()
    }

    fn decode_abi(data: &[u8]) -> Result<Self> {
        let mut dec = TupleDecoder::new(data, Self::SCHEMA)?;
        let pack = Self {
            status: AckStatus::try_from(dec.uint8()?)?,
            id: dec.uint256()?,
            operator: dec.address()?,
            operation_type: dec.uint8()?,
            members: dec.address_array()?,
            extra_data: dec.bytes()?,
        };
        dec.finish()?;
        Ok(pack)
    }
}

/// Every payload the group channel can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossChainPayload {
    MirrorGroupSyn(MirrorGroupSynPackage),
    MirrorGroupAck(MirrorGroupAckPackage),
    CreateGroupSyn(CreateGroupSynPackage),
    CreateGroupAck(CreateGroupAckPackage),
    DeleteGroupSyn(DeleteGroupSynPackage),
    DeleteGroupAck(DeleteGroupAckPackage),
    UpdateGroupMemberSynV1(UpdateGroupMemberSynPackageV1),
    UpdateGroupMemberSyn(UpdateGroupMemberSynPackage),
    UpdateGroupMemberAck(UpdateGroupMemberAckPackage),
}

impl CrossChainPayload {
    pub fn operation_type(&self) -> u8 {
        match self {
            CrossChainPayload::MirrorGroupSyn(_) | CrossChainPayload::MirrorGroupAck(_) => {
                OPERATION_MIRROR_GROUP
            }
            CrossChainPayload::CreateGroupSyn(_) | CrossChainPayload::CreateGroupAck(_) => {
                OPERATION_CREATE_GROUP
            }
            CrossChainPayload::DeleteGroupSyn(_) | CrossChainPayload::DeleteGroupAck(_) => {
                OPERATION_DELETE_GROUP
            }
            CrossChainPayload::UpdateGroupMemberSynV1(_)
            | CrossChainPayload::UpdateGroupMemberSyn(_)
            | CrossChainPayload::UpdateGroupMemberAck(_) => OPERATION_UPDATE_GROUP_MEMBER,
        }
    }

    /// ABI bytes of the wrapped package
    pub fn encode_abi(&self) -> Vec<u8> {
        match self {
            CrossChainPayload::MirrorGroupSyn(p) => p.encode_abi(),
            CrossChainPayload::MirrorGroupAck(p) => p.encode_abi(),
            CrossChainPayload::CreateGroupSyn(p) => p.encode_abi(),
            CrossChainPayload::CreateGroupAck(p) => p.encode_abi(),
            CrossChainPayload::DeleteGroupSyn(p) => p.encode_abi(),
            CrossChainPayload::DeleteGroupAck(p) => p.encode_abi(),
            CrossChainPayload::UpdateGroupMemberSynV1(p) => p.encode_abi(),
            CrossChainPayload::UpdateGroupMemberSyn(p) => p.encode_abi(),
            CrossChainPayload::UpdateGroupMemberAck(p) => p.encode_abi(),
        }
    }
}

/// Fail ack with no echoed fields, used when a request could not be decoded.
pub fn fail_ack_for(operation_type: u8) -> Vec<u8> {
    match operation_type {
        OPERATION_MIRROR_GROUP => MirrorGroupAckPackage {
            status: AckStatus::Fail,
            id: U256::ZERO,
        }
        .encode_abi(),
        OPERATION_CREATE_GROUP => CreateGroupAckPackage {
            status: AckStatus::Fail,
            id: U256::ZERO,
            creator: Address::ZERO,
            extra_data: Vec::new(),
        }
        .encode_abi(),
        OPERATION_DELETE_GROUP => DeleteGroupAckPackage {
            status: AckStatus::Fail,
            id: U256::ZERO,
            extra_data: Vec::new(),
        }
        .encode_abi(),
        _ => UpdateGroupMemberAckPackage::fail(Address::ZERO, Vec::new()).encode_abi(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::abi::WORD;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn update_v2() -> UpdateGroupMemberSynPackage {
        UpdateGroupMemberSynPackage {
            operator: addr(1),
            group_id: U256::from(7u64),
            operation_type: 1,
            members: vec![addr(2), addr(3)],
            extra_data: b"cb".to_vec(),
            member_expiration: vec![0, 1000],
        }
    }

    #[test]
    fn test_static_schemas_are_inline() {
        let syn = MirrorGroupSynPackage {
            id: U256::MAX,
            owner: addr(9),
        };
        let bytes = syn.encode_abi();
        assert_eq!(bytes.len(), 2 * WORD);
        assert_eq!(MirrorGroupSynPackage::decode_abi(&bytes).unwrap(), syn);
    }

    #[test]
    fn test_update_v2_decodes() {
        let pack = update_v2();
        let decoded = UpdateGroupMemberSynPackage::decode_abi(&pack.encode_abi()).unwrap();
        assert_eq!(decoded, pack);
        assert_eq!(decoded.validate_basic().unwrap(), MemberOperation::Add);
    }

    #[test]
    fn test_v1_bytes_are_not_v2() {
        let v1 = UpdateGroupMemberSynPackageV1 {
            operator: addr(1),
            group_id: U256::from(7u64),
            operation_type: 2,
            members: vec![addr(2)],
            extra_data: vec![],
        };
        assert!(UpdateGroupMemberSynPackage::decode_abi(&v1.encode_abi()).is_err());
    }

    #[test]
    fn test_validate_basic_rules() {
        let mut pack = update_v2();
        pack.operation_type = 3;
        assert!(matches!(
            pack.validate_basic(),
            Err(ProtocolError::InvalidRequest(_))
        ));

        let mut pack = update_v2();
        pack.operator = Address::ZERO;
        assert!(matches!(
            pack.validate_basic(),
            Err(ProtocolError::InvalidAddress(_))
        ));

        let mut pack = update_v2();
        pack.members.push(Address::ZERO);
        pack.member_expiration.push(0);
        assert!(pack.validate_basic().is_err());

        let mut pack = update_v2();
        pack.member_expiration.pop();
        assert!(matches!(
            pack.validate_basic(),
            Err(ProtocolError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_unknown_ack_status_rejected() {
        let mut bytes = MirrorGroupAckPackage {
            status: AckStatus::Success,
            id: U256::from(1u64),
        }
        .encode_abi();
        bytes[WORD - 1] = 2;
        assert!(matches!(
            MirrorGroupAckPackage::decode_abi(&bytes),
            Err(ProtocolError::MalformedPackage(_))
        ));
    }

    #[test]
    fn test_fail_ack_for_each_operation() {
        let ack = CreateGroupAckPackage::decode_abi(&fail_ack_for(OPERATION_CREATE_GROUP)).unwrap();
        assert_eq!(ack.status, AckStatus::Fail);
        let ack =
            UpdateGroupMemberAckPackage::decode_abi(&fail_ack_for(0xEE)).unwrap();
        assert_eq!(ack.status, AckStatus::Fail);
    }
}
