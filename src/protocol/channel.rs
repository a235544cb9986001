//! # Channel Router
//!
//! Binds each cross-chain channel to exactly one application and tracks the
//! channel's package sequences.
//!
//! ## Sequences
//! Inbound packages must arrive with the next receive sequence; anything else
//! is a replay or a gap and is rejected before decoding. Outbound syn
//! packages take the next send sequence. Acks reuse the sequence of the syn
//! they answer.
//!
//! ## Migration
//! [`ChannelRouter::migrate_channel`] swaps the bound application in place.
//! Sequences are kept, so in-flight packages are answered by the new
//! handler. Migrating to a schema version not newer than the bound one does
//! nothing.

use crate::context::BlockContext;
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::membership::keeper::Keeper;
use crate::protocol::app::{AppContext, CrossChainApplication};
use crate::protocol::package::{ChannelId, PackageType, SchemaVersion};
use crate::utils::metrics::{global_metrics, Timer};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

struct ChannelBinding {
    app: Box<dyn CrossChainApplication>,
    receive_sequence: u64,
    send_sequence: u64,
}

/// Result of delivering one inbound package.
#[derive(Debug, Default)]
pub struct Delivery {
    /// Ack frame to relay back, present for every answered syn
    pub ack: Option<Packet>,
    /// Error the application reported while executing the package
    pub error: Option<ProtocolError>,
}

#[derive(Default)]
pub struct ChannelRouter {
    channels: BTreeMap<ChannelId, ChannelBinding>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `app` to a channel that has no application yet.
    pub fn register_channel(
        &mut self,
        channel: ChannelId,
        app: Box<dyn CrossChainApplication>,
    ) -> Result<()> {
        if self.channels.contains_key(&channel) {
            return Err(ProtocolError::AlreadyExists(format!(
                "{}: {channel}",
                constants::ERR_CHANNEL_ALREADY_BOUND
            )));
        }
        info!(channel, app = app.name(), version = %app.schema_version(), "channel bound");
        self.channels.insert(
            channel,
            ChannelBinding {
                app,
                receive_sequence: 0,
                send_sequence: 0,
            },
        );
        Ok(())
    }

    /// Replace the application bound to `channel`.
    ///
    /// Returns `false` without touching the binding when the bound
    /// application already speaks `app`'s schema version or a newer one.
    #[instrument(skip(self, app), fields(version = %app.schema_version()))]
    pub fn migrate_channel(
        &mut self,
        channel: ChannelId,
        app: Box<dyn CrossChainApplication>,
    ) -> Result<bool> {
        let binding = self.channels.get_mut(&channel).ok_or_else(|| {
            ProtocolError::Migration(format!("{}: {channel}", constants::ERR_CHANNEL_NOT_BOUND))
        })?;

        let current = binding.app.schema_version();
        if current >= app.schema_version() {
            debug!(channel, %current, "channel already migrated");
            return Ok(false);
        }

        info!(channel, from = %current, "channel migrated");
        binding.app = app;
        Ok(true)
    }

    pub fn schema_version(&self, channel: ChannelId) -> Option<SchemaVersion> {
        self.channels
            .get(&channel)
            .map(|binding| binding.app.schema_version())
    }

    pub fn app_name(&self, channel: ChannelId) -> Option<&'static str> {
        self.channels.get(&channel).map(|binding| binding.app.name())
    }

    /// Sequence the next inbound package must carry
    pub fn receive_sequence(&self, channel: ChannelId) -> Option<u64> {
        self.channels
            .get(&channel)
            .map(|binding| binding.receive_sequence)
    }

    /// Sequence the next outbound syn will carry
    pub fn send_sequence(&self, channel: ChannelId) -> Option<u64> {
        self.channels.get(&channel).map(|binding| binding.send_sequence)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver an inbound relay frame to the application bound to its channel.
    ///
    /// Frame-level problems (unbound channel, bad package type, wrong
    /// sequence) are returned as errors and consume no sequence. Errors the
    /// application reports are carried in [`Delivery::error`] next to the ack.
    #[instrument(skip_all, fields(channel = packet.channel_id, sequence = packet.sequence))]
    pub fn deliver(
        &mut self,
        keeper: &mut Keeper,
        block: &BlockContext,
        packet: &Packet,
    ) -> Result<Delivery> {
        let _timer = Timer::start("deliver");
        let metrics = global_metrics();
        let channel = packet.channel_id;
        let Some(binding) = self.channels.get_mut(&channel) else {
            metrics.package_rejected();
            return Err(ProtocolError::NotFound(format!(
                "{}: {channel}",
                constants::ERR_CHANNEL_NOT_BOUND
            )));
        };

        let package_type = match PackageType::try_from(packet.package_type) {
            Ok(package_type) => package_type,
            Err(err) => {
                metrics.package_rejected();
                return Err(err);
            }
        };

        if packet.sequence != binding.receive_sequence {
            metrics.package_rejected();
            warn!(
                expected = binding.receive_sequence,
                got = packet.sequence,
                "package sequence rejected"
            );
            return Err(ProtocolError::InvalidSequence {
                channel,
                expected: binding.receive_sequence,
                got: packet.sequence,
            });
        }
        binding.receive_sequence += 1;
        metrics.package_received(packet.payload.len() as u64);

        let ctx = AppContext {
            channel_id: channel,
            sequence: packet.sequence,
        };
        let app = binding.app.as_ref();
        let result = match package_type {
            PackageType::Syn => app.execute_syn_package(keeper, block, &ctx, &packet.payload),
            PackageType::Ack => app.execute_ack_package(keeper, block, &ctx, &packet.payload),
            PackageType::FailAck => {
                app.execute_fail_ack_package(keeper, block, &ctx, &packet.payload)
            }
        };

        if let Some(err) = &result.err {
            debug!(%package_type, error = %err, "package executed with error");
        }

        let ack = if package_type == PackageType::Syn && !result.payload.is_empty() {
            metrics.ack(result.is_ok());
            metrics.package_sent();
            Some(Packet::new(
                channel,
                PackageType::Ack as u8,
                packet.sequence,
                result.payload,
            ))
        } else {
            None
        };

        Ok(Delivery {
            ack,
            error: result.err,
        })
    }

    /// Frame an outbound syn envelope with the channel's next send sequence.
    pub fn send_package(&mut self, channel: ChannelId, payload: Vec<u8>) -> Result<Packet> {
        let binding = self.channels.get_mut(&channel).ok_or_else(|| {
            ProtocolError::NotFound(format!("{}: {channel}", constants::ERR_CHANNEL_NOT_BOUND))
        })?;
        let sequence = binding.send_sequence;
        binding.send_sequence += 1;
        global_metrics().package_sent();
        debug!(channel, sequence, "package sent");
        Ok(Packet::new(channel, PackageType::Syn as u8, sequence, payload))
    }
}

impl std::fmt::Debug for ChannelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (channel, binding) in &self.channels {
            map.entry(channel, &binding.app.schema_version());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::app::GroupApp;
    use crate::protocol::dispatcher::PackageDispatcher;

    fn router() -> ChannelRouter {
        let mut router = ChannelRouter::new();
        router
            .register_channel(6, Box::new(GroupApp::new(PackageDispatcher::default())))
            .unwrap();
        router
    }

    #[test]
    fn test_channel_binds_once() {
        let mut router = router();
        let err = router
            .register_channel(6, Box::new(GroupApp::new(PackageDispatcher::default())))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::AlreadyExists(_)));
        assert_eq!(router.channel_count(), 1);
    }

    #[test]
    fn test_out_of_order_sequence_rejected() {
        let mut router = router();
        let mut keeper = Keeper::default();
        let block = BlockContext::at_unix(1, 1);

        let packet = Packet::new(6, 0, 1, vec![0x09]);
        let err = router.deliver(&mut keeper, &block, &packet).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidSequence {
                expected: 0,
                got: 1,
                ..
            }
        ));
        assert_eq!(router.receive_sequence(6), Some(0));

        let packet = Packet::new(6, 5, 0, vec![0x09]);
        assert!(router.deliver(&mut keeper, &block, &packet).is_err());
        assert_eq!(router.receive_sequence(6), Some(0));
    }

    #[test]
    fn test_send_sequence_advances() {
        let mut router = router();
        assert_eq!(router.send_package(6, vec![1]).unwrap().sequence, 0);
        assert_eq!(router.send_package(6, vec![1]).unwrap().sequence, 1);
        assert!(router.send_package(9, vec![1]).is_err());
    }
}
