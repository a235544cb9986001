//! # Relay Frame
//!
//! Binary frame carrying one cross-chain package between a relayer and the chain.
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Version(1)] [Channel(1)] [PackageType(1)] [Sequence(8)] [Length(4)] [Payload(N)]
//! ```
//!
//! The payload is the package envelope `[operation type][ABI tuple]`; the frame
//! never inspects it.
//!
//! ## Security
//! - Length is validated against [`MAX_PAYLOAD_SIZE`] before allocation
//! - Magic bytes and version are checked before anything else is read

use crate::config::{MAGIC_BYTES, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};

/// Size of the fixed frame header
pub const HEADER_SIZE: usize = 19;

/// One relay frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub channel_id: u8,
    pub package_type: u8,
    pub sequence: u64,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Frame a package for the current relay version.
    pub fn new(channel_id: u8, package_type: u8, sequence: u64, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            channel_id,
            package_type,
            sequence,
            payload,
        }
    }

    /// Parse a frame from a complete byte slice.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolError::InvalidHeader);
        }
        let header = parse_header(buf)?;
        let body = &buf[HEADER_SIZE..];
        if body.len() != header.length {
            return Err(ProtocolError::InvalidHeader);
        }

        Ok(Self {
            version: header.version,
            channel_id: header.channel_id,
            package_type: header.package_type,
            sequence: header.sequence,
            payload: body.to_vec(),
        })
    }

    /// Serialize the frame, header first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        self.write_header(&mut out);
        out.extend_from_slice(&self.payload);
        out
    }

    pub(crate) fn write_header(&self, out: &mut impl Extend<u8>) {
        out.extend(MAGIC_BYTES);
        out.extend([self.version, self.channel_id, self.package_type]);
        out.extend(self.sequence.to_be_bytes());
        out.extend((self.payload.len() as u32).to_be_bytes());
    }
}

/// Header fields decoded ahead of the payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub version: u8,
    pub channel_id: u8,
    pub package_type: u8,
    pub sequence: u64,
    pub length: usize,
}

/// Decode and validate the fixed header. `buf` must hold at least [`HEADER_SIZE`] bytes.
pub(crate) fn parse_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < HEADER_SIZE || buf[0..4] != MAGIC_BYTES {
        return Err(ProtocolError::InvalidHeader);
    }

    let version = buf[4];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let mut sequence = [0u8; 8];
    sequence.copy_from_slice(&buf[7..15]);
    let mut length = [0u8; 4];
    length.copy_from_slice(&buf[15..19]);
    let length = u32::from_be_bytes(length) as usize;

    if length > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::OversizedPacket(length));
    }

    Ok(FrameHeader {
        version,
        channel_id: buf[5],
        package_type: buf[6],
        sequence: u64::from_be_bytes(sequence),
        length,
    })
}
