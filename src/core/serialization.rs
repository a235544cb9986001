//! # Serialization Formats
//!
//! Serialization of domain records (events, group info) for indexers and tooling.
//! The cross-chain wire format is ABI and lives in [`crate::core::abi`]; this
//! module only covers the off-chain export formats.
//!
//! ## Formats
//! - **Bincode**: compact binary, default
//! - **JSON**: human-readable, for debugging and external indexers
//!
//! ## Usage
//! ```ignore
//! use membership_protocol::core::serialization::{MultiFormat, SerializationFormat};
//!
//! let bytes = event.serialize_with_header(SerializationFormat::Json)?;
//! let (event, format) = GroupEvent::deserialize_with_header(&bytes)?;
//! ```

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    /// Binary compact format (default)
    #[default]
    Bincode,
    /// Human-readable JSON format
    Json,
}

impl SerializationFormat {
    /// Get the format identifier byte
    pub fn format_byte(self) -> u8 {
        match self {
            SerializationFormat::Bincode => 0x01,
            SerializationFormat::Json => 0x02,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializationFormat::Bincode),
            0x02 => Some(SerializationFormat::Json),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
        }
    }
}

/// Trait for types that support multiple serialization formats
pub trait MultiFormat: Serialize + for<'de> Deserialize<'de> + Sized {
    /// Serialize to bytes using the specified format
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        match format {
            SerializationFormat::Bincode => {
                bincode::serialize(self).map_err(|e| ProtocolError::SerializeError(e.to_string()))
            }
            SerializationFormat::Json => {
                serde_json::to_vec(self).map_err(|e| ProtocolError::SerializeError(e.to_string()))
            }
        }
    }

    /// Serialize to bytes with format header
    fn serialize_with_header(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        let mut data = vec![format.format_byte()];
        let mut payload = self.serialize_format(format)?;
        data.append(&mut payload);
        Ok(data)
    }

    /// Deserialize from bytes using the specified format
    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        match format {
            SerializationFormat::Bincode => bincode::deserialize(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
        }
    }

    /// Deserialize from bytes with format header
    fn deserialize_with_header(data: &[u8]) -> Result<(Self, SerializationFormat)> {
        let (&first, rest) = data
            .split_first()
            .ok_or_else(|| ProtocolError::DeserializeError("Empty data".to_string()))?;

        let format = SerializationFormat::from_byte(first).ok_or_else(|| {
            ProtocolError::DeserializeError(format!("Unknown format byte: {first}"))
        })?;

        let value = Self::deserialize_format(rest, format)?;
        Ok((value, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::primitives::Address;
    use crate::membership::events::GroupEvent;

    fn sample_event() -> GroupEvent {
        GroupEvent::GroupDeleted {
            owner: Address::new([1u8; 20]),
            group_name: "team".to_string(),
            group_id: 3,
        }
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_format_byte_roundtrip() {
        for format in &[SerializationFormat::Bincode, SerializationFormat::Json] {
            let byte = format.format_byte();
            let recovered = SerializationFormat::from_byte(byte).expect("valid format byte");
            assert_eq!(*format, recovered);
        }
        assert_eq!(SerializationFormat::from_byte(0x03), None);
    }

    #[test]
    fn test_default_format() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Bincode);
        assert_eq!(SerializationFormat::Json.name(), "JSON");
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_header_roundtrip_json() {
        let event = sample_event();
        let bytes = event
            .serialize_with_header(SerializationFormat::Json)
            .expect("serialize");
        assert_eq!(bytes[0], 0x02);
        let (recovered, format) = GroupEvent::deserialize_with_header(&bytes).expect("deserialize");
        assert_eq!(format, SerializationFormat::Json);
        assert_eq!(recovered, event);
    }

    #[test]
    fn test_empty_and_unknown_header() {
        assert!(GroupEvent::deserialize_with_header(&[]).is_err());
        assert!(GroupEvent::deserialize_with_header(&[0x09, 1, 2]).is_err());
    }
}
