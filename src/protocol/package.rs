//! # Package Envelope
//!
//! Identifiers shared by every cross-chain package and the envelope that wraps a
//! payload with its operation type.
//!
//! ## Envelope
//! ```text
//! [OperationType(1)] [ABI tuple(N)]
//! ```
//!
//! The envelope travels with a channel id and a package type (`Syn`, `Ack`,
//! `FailAck`), both carried by the relay frame rather than the envelope.

use crate::error::{constants, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cross-chain channel identifier
pub type ChannelId = u8;

/// Operation type tags
pub const OPERATION_MIRROR_GROUP: u8 = 0x03;
pub const OPERATION_CREATE_GROUP: u8 = 0x07;
pub const OPERATION_DELETE_GROUP: u8 = 0x08;
pub const OPERATION_UPDATE_GROUP_MEMBER: u8 = 0x09;

/// Member operation carried by an update package
pub const OPERATION_ADD_GROUP_MEMBER: u8 = 1;
pub const OPERATION_DELETE_GROUP_MEMBER: u8 = 2;

/// Direction of a package on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PackageType {
    /// Request
    Syn = 0,
    /// Acknowledgement of a request sent by this chain
    Ack = 1,
    /// The counterpart failed to execute a request sent by this chain
    FailAck = 2,
}

impl PackageType {
    pub const ALL: [PackageType; 3] = [PackageType::Syn, PackageType::Ack, PackageType::FailAck];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for PackageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PackageType::Syn),
            1 => Ok(PackageType::Ack),
            2 => Ok(PackageType::FailAck),
            _ => Err(ProtocolError::malformed(constants::ERR_INVALID_PACKAGE_TYPE)),
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageType::Syn => "syn",
            PackageType::Ack => "ack",
            PackageType::FailAck => "fail_ack",
        };
        f.write_str(name)
    }
}

/// Member operation of an update package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOperation {
    Add,
    Delete,
}

impl MemberOperation {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            OPERATION_ADD_GROUP_MEMBER => Some(MemberOperation::Add),
            OPERATION_DELETE_GROUP_MEMBER => Some(MemberOperation::Delete),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            MemberOperation::Add => OPERATION_ADD_GROUP_MEMBER,
            MemberOperation::Delete => OPERATION_DELETE_GROUP_MEMBER,
        }
    }
}

/// Acknowledgement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AckStatus {
    Success = 0,
    Fail = 1,
}

impl AckStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for AckStatus {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AckStatus::Success),
            1 => Ok(AckStatus::Fail),
            other => Err(ProtocolError::MalformedPackage(format!(
                "unknown ack status {other}"
            ))),
        }
    }
}

/// Version of the payload schemas registered for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u8);

impl SchemaVersion {
    pub const V1: SchemaVersion = SchemaVersion(1);
    pub const V2: SchemaVersion = SchemaVersion(2);
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Envelope pairing an operation type with its ABI payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossChainPackage {
    pub operation_type: u8,
    pub package: Vec<u8>,
}

impl CrossChainPackage {
    pub fn new(operation_type: u8, package: Vec<u8>) -> Self {
        Self {
            operation_type,
            package,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.package.len());
        out.push(self.operation_type);
        out.extend_from_slice(&self.package);
        out
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        let (&operation_type, package) = raw
            .split_first()
            .ok_or_else(|| ProtocolError::malformed(constants::ERR_EMPTY_ENVELOPE))?;
        Ok(Self {
            operation_type,
            package: package.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_type_bounds() {
        for (raw, expected) in [(0u8, PackageType::Syn), (1, PackageType::Ack), (2, PackageType::FailAck)] {
            assert_eq!(PackageType::try_from(raw).unwrap(), expected);
            assert_eq!(expected.index(), raw as usize);
        }
        assert!(matches!(
            PackageType::try_from(3),
            Err(ProtocolError::MalformedPackage(_))
        ));
    }

    #[test]
    fn test_envelope() {
        let pack = CrossChainPackage::new(OPERATION_UPDATE_GROUP_MEMBER, vec![1, 2, 3]);
        let raw = pack.serialize();
        assert_eq!(raw, vec![0x09, 1, 2, 3]);
        assert_eq!(CrossChainPackage::deserialize(&raw).unwrap(), pack);
        assert!(CrossChainPackage::deserialize(&[]).is_err());

        let bare = CrossChainPackage::deserialize(&[0x07]).unwrap();
        assert!(bare.package.is_empty());
    }

    #[test]
    fn test_ack_status_and_member_operation() {
        assert_eq!(AckStatus::try_from(0).unwrap(), AckStatus::Success);
        assert!(AckStatus::try_from(2).is_err());
        assert_eq!(MemberOperation::from_u8(1), Some(MemberOperation::Add));
        assert_eq!(MemberOperation::from_u8(3), None);
        assert!(SchemaVersion::V1 < SchemaVersion::V2);
    }
}
