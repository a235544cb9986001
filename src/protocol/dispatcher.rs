//! # Package Dispatcher
//!
//! Routes raw cross-chain packages to the decoder registered for their
//! `(channel, operation type)` and schema version.
//!
//! ## Routing
//! 1. reject a package type outside `Syn`/`Ack`/`FailAck`
//! 2. reject packages above the configured size
//! 3. split the envelope into operation type and ABI payload
//! 4. pick the decoder set for the requested schema version
//! 5. run the decoder for the package type
//!
//! The registry sits behind `Arc<RwLock<..>>`, so clones of a dispatcher
//! share one table. Registration is additive: schemas registered for an older
//! version stay routable after newer ones are added.

use crate::config::LimitsConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::CrossChainPayload;
use crate::protocol::package::{ChannelId, CrossChainPackage, PackageType, SchemaVersion};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Decoder from ABI bytes to a typed payload
pub type DecodeFn = fn(&[u8]) -> Result<CrossChainPayload>;

/// Decoders indexed by [`PackageType::index`]
pub type DecoderSet = [DecodeFn; 3];

type Registry = HashMap<(ChannelId, u8), BTreeMap<SchemaVersion, DecoderSet>>;

#[derive(Clone)]
pub struct PackageDispatcher {
    registry: Arc<RwLock<Registry>>,
    max_package_size: usize,
}

impl Default for PackageDispatcher {
    fn default() -> Self {
        Self::new(LimitsConfig::default().max_package_size)
    }
}

impl PackageDispatcher {
    pub fn new(max_package_size: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            max_package_size,
        }
    }

    pub fn max_package_size(&self) -> usize {
        self.max_package_size
    }

    /// Register decoders for `(channel, operation_type)` at `version`.
    ///
    /// Returns `false` when that exact entry already exists; the existing
    /// decoders are kept.
    pub fn register(
        &self,
        channel: ChannelId,
        operation_type: u8,
        version: SchemaVersion,
        decoders: DecoderSet,
    ) -> Result<bool> {
        let mut registry = self.registry.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;

        let versions = registry.entry((channel, operation_type)).or_default();
        if versions.contains_key(&version) {
            return Ok(false);
        }
        versions.insert(version, decoders);
        debug!(channel, operation_type, %version, "schema registered");
        Ok(true)
    }

    pub fn is_registered(
        &self,
        channel: ChannelId,
        operation_type: u8,
        version: SchemaVersion,
    ) -> Result<bool> {
        let registry = self.read()?;
        Ok(registry
            .get(&(channel, operation_type))
            .is_some_and(|versions| versions.contains_key(&version)))
    }

    /// Schema versions registered for `(channel, operation_type)`, oldest first.
    pub fn registered_versions(
        &self,
        channel: ChannelId,
        operation_type: u8,
    ) -> Result<Vec<SchemaVersion>> {
        let registry = self.read()?;
        Ok(registry
            .get(&(channel, operation_type))
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default())
    }

    /// Total number of `(channel, operation, version)` entries.
    pub fn entry_count(&self) -> Result<usize> {
        let registry = self.read()?;
        Ok(registry.values().map(BTreeMap::len).sum())
    }

    /// Decode with the newest registered schema.
    pub fn route(
        &self,
        channel: ChannelId,
        raw: &[u8],
        package_type: u8,
    ) -> Result<CrossChainPayload> {
        self.route_at(channel, raw, package_type, SchemaVersion(u8::MAX))
    }

    /// Decode with the newest schema not newer than `version`.
    pub fn route_at(
        &self,
        channel: ChannelId,
        raw: &[u8],
        package_type: u8,
        version: SchemaVersion,
    ) -> Result<CrossChainPayload> {
        let package_type = PackageType::try_from(package_type)?;
        if raw.len() > self.max_package_size {
            return Err(ProtocolError::MalformedPackage(format!(
                "{}: {} bytes exceeds {}",
                constants::ERR_INVALID_CROSS_CHAIN_PACKAGE,
                raw.len(),
                self.max_package_size
            )));
        }

        let envelope = CrossChainPackage::deserialize(raw)?;
        let decode = {
            let registry = self.read()?;
            let decoders = registry
                .get(&(channel, envelope.operation_type))
                .and_then(|versions| versions.range(..=version).next_back())
                .map(|(_, decoders)| decoders)
                .ok_or_else(|| {
                    ProtocolError::MalformedPackage(format!(
                        "{}: channel {channel}, operation {:#04x}",
                        constants::ERR_UNKNOWN_OPERATION,
                        envelope.operation_type
                    ))
                })?;
            decoders[package_type.index()]
        };

        decode(&envelope.package)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Registry>> {
        self.registry
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))
    }
}

impl std::fmt::Debug for PackageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageDispatcher")
            .field("entries", &self.entry_count().unwrap_or_default())
            .field("max_package_size", &self.max_package_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::abi::AbiPackage;
    use crate::core::primitives::{Address, U256};
    use crate::protocol::message::{MirrorGroupAckPackage, MirrorGroupSynPackage};
    use crate::protocol::package::{AckStatus, OPERATION_MIRROR_GROUP};

    fn decode_syn(data: &[u8]) -> Result<CrossChainPayload> {
        MirrorGroupSynPackage::decode_abi(data).map(CrossChainPayload::MirrorGroupSyn)
    }

    fn decode_ack(data: &[u8]) -> Result<CrossChainPayload> {
        MirrorGroupAckPackage::decode_abi(data).map(CrossChainPayload::MirrorGroupAck)
    }

    fn mirror_envelope() -> Vec<u8> {
        let syn = MirrorGroupSynPackage {
            id: U256::from(3u64),
            owner: Address::new([4u8; 20]),
        };
        CrossChainPackage::new(OPERATION_MIRROR_GROUP, syn.encode_abi()).serialize()
    }

    #[test]
    fn test_register_reports_duplicates() {
        let dispatcher = PackageDispatcher::default();
        let set: DecoderSet = [decode_syn, decode_ack, decode_syn];
        assert!(dispatcher.register(6, OPERATION_MIRROR_GROUP, SchemaVersion::V1, set).unwrap());
        assert!(!dispatcher.register(6, OPERATION_MIRROR_GROUP, SchemaVersion::V1, set).unwrap());
        assert_eq!(dispatcher.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_route_rejects_bad_inputs() {
        let dispatcher = PackageDispatcher::default();
        dispatcher
            .register(6, OPERATION_MIRROR_GROUP, SchemaVersion::V1, [decode_syn, decode_ack, decode_syn])
            .unwrap();
        let raw = mirror_envelope();

        assert!(dispatcher.route(6, &raw, 3).is_err());
        assert!(dispatcher.route(7, &raw, 0).is_err());
        assert!(dispatcher.route(6, &[], 0).is_err());
        assert!(dispatcher.route(6, &raw, 1).is_err());
        assert!(matches!(
            dispatcher.route(6, &raw, 0).unwrap(),
            CrossChainPayload::MirrorGroupSyn(_)
        ));
    }

    #[test]
    fn test_fail_ack_uses_syn_decoder() {
        let dispatcher = PackageDispatcher::default();
        dispatcher
            .register(6, OPERATION_MIRROR_GROUP, SchemaVersion::V1, [decode_syn, decode_ack, decode_syn])
            .unwrap();
        let payload = dispatcher.route(6, &mirror_envelope(), 2).unwrap();
        assert_eq!(payload.operation_type(), OPERATION_MIRROR_GROUP);

        let ack = MirrorGroupAckPackage {
            status: AckStatus::Success,
            id: U256::from(3u64),
        };
        let raw = CrossChainPackage::new(OPERATION_MIRROR_GROUP, ack.encode_abi()).serialize();
        assert!(matches!(
            dispatcher.route(6, &raw, 1).unwrap(),
            CrossChainPayload::MirrorGroupAck(_)
        ));
    }

    #[test]
    fn test_oversized_package_rejected() {
        let dispatcher = PackageDispatcher::new(8);
        dispatcher
            .register(6, OPERATION_MIRROR_GROUP, SchemaVersion::V1, [decode_syn, decode_ack, decode_syn])
            .unwrap();
        assert!(matches!(
            dispatcher.route(6, &mirror_envelope(), 0),
            Err(ProtocolError::MalformedPackage(_))
        ));
    }

    #[test]
    fn test_clones_share_registry() {
        let dispatcher = PackageDispatcher::default();
        let handle = dispatcher.clone();
        handle
            .register(6, OPERATION_MIRROR_GROUP, SchemaVersion::V2, [decode_syn, decode_ack, decode_syn])
            .unwrap();
        assert!(dispatcher.is_registered(6, OPERATION_MIRROR_GROUP, SchemaVersion::V2).unwrap());
        assert!(dispatcher.route_at(6, &mirror_envelope(), 0, SchemaVersion::V1).is_err());
    }
}
