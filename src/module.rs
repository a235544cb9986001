//! # Group Module
//!
//! Composition root: owns the keeper, the package dispatcher and the channel
//! router, and tracks the module's consensus version.
//!
//! A fresh module speaks the launch schemas on the group channel. Calling
//! [`GroupModule::migrate_to_v2`] (directly or through the upgrade hooks)
//! registers the member-expiration schemas and rebinds the channel to
//! [`GroupAppV2`]. The migration runs at most once.

use crate::config::ProtocolConfig;
use crate::context::BlockContext;
use crate::core::abi::AbiPackage;
use crate::core::packet::Packet;
use crate::core::primitives::{Address, U256};
use crate::error::{ProtocolError, Result};
use crate::membership::keeper::Keeper;
use crate::membership::msg::MsgMirrorGroup;
use crate::membership::msg_server::MsgServer;
use crate::membership::query::Querier;
use crate::protocol::app::GroupApp;
use crate::protocol::app_v2::GroupAppV2;
use crate::protocol::channel::{ChannelRouter, Delivery};
use crate::protocol::dispatcher::PackageDispatcher;
use crate::protocol::message::MirrorGroupSynPackage;
use crate::protocol::package::{ChannelId, CrossChainPackage, OPERATION_MIRROR_GROUP};
use crate::protocol::schemas::{register_group_schemas_v1, register_group_schemas_v2};
use crate::utils::metrics::global_metrics;
use tracing::{debug, info, instrument, warn};

/// Consensus version before member expiration
pub const CONSENSUS_VERSION_V1: u64 = 1;
/// Consensus version with member expiration
pub const CONSENSUS_VERSION_V2: u64 = 2;

pub struct GroupModule {
    config: ProtocolConfig,
    keeper: Keeper,
    dispatcher: PackageDispatcher,
    router: ChannelRouter,
    consensus_version: u64,
}

impl GroupModule {
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        Self::with_keeper(config, Keeper::default())
    }

    /// Build a module around an existing keeper, e.g. one with a custom
    /// member store or permission verifier.
    pub fn with_keeper(config: ProtocolConfig, keeper: Keeper) -> Result<Self> {
        config.validate_strict()?;
        let channel = config.channel.group_channel_id;
        let dispatcher = PackageDispatcher::new(config.limits.max_package_size);
        register_group_schemas_v1(&dispatcher, channel)?;

        let mut router = ChannelRouter::new();
        let app = GroupApp::with_limits(dispatcher.clone(), config.limits.clone());
        router.register_channel(channel, Box::new(app))?;

        info!(channel, name = %config.channel.group_channel_name, "group module initialised");
        Ok(Self {
            config,
            keeper,
            dispatcher,
            router,
            consensus_version: CONSENSUS_VERSION_V1,
        })
    }

    pub fn consensus_version(&self) -> u64 {
        self.consensus_version
    }

    pub fn group_channel_id(&self) -> ChannelId {
        self.config.channel.group_channel_id
    }

    /// Move the group channel to the member-expiration schemas.
    ///
    /// Returns `false` when the module is already at version 2.
    #[instrument(skip(self), fields(from = self.consensus_version))]
    pub fn migrate_to_v2(&mut self) -> Result<bool> {
        if self.consensus_version >= CONSENSUS_VERSION_V2 {
            debug!("group module already at version 2");
            return Ok(false);
        }

        let channel = self.group_channel_id();
        register_group_schemas_v2(&self.dispatcher, channel)
            .map_err(|e| ProtocolError::Migration(format!("register v2 schemas: {e}")))?;
        let app = GroupAppV2::new(GroupApp::with_limits(
            self.dispatcher.clone(),
            self.config.limits.clone(),
        ));
        self.router.migrate_channel(channel, Box::new(app))?;

        self.consensus_version = CONSENSUS_VERSION_V2;
        global_metrics().migration();
        info!(channel, "group module migrated to version 2");
        global_metrics().log_metrics();
        Ok(true)
    }

    /// Deliver an inbound relay frame.
    pub fn deliver(&mut self, block: &BlockContext, packet: &Packet) -> Result<Delivery> {
        self.router.deliver(&mut self.keeper, block, packet)
    }

    pub fn msg_server(&mut self) -> MsgServer<'_> {
        MsgServer::new(&mut self.keeper, &self.config.limits)
    }

    pub fn query(&self) -> Querier<'_> {
        Querier::new(&self.keeper)
    }

    /// Mirror an origin group to the foreign chain and frame the syn package.
    ///
    /// The group stays `MirrorPending` until the ack or fail ack arrives.
    #[instrument(skip_all, fields(operator = %msg.operator, group = %msg.group_name))]
    pub fn mirror_group(&mut self, msg: MsgMirrorGroup) -> Result<Packet> {
        msg.validate_basic(&self.config.limits)?;
        let operator: Address = msg.operator.parse()?;
        let group = self.keeper.mirror_group(operator, operator, &msg.group_name)?;

        let syn = MirrorGroupSynPackage {
            id: U256::from(group.id),
            owner: group.owner,
        };
        let envelope = CrossChainPackage::new(OPERATION_MIRROR_GROUP, syn.encode_abi()).serialize();
        let channel = self.group_channel_id();
        match self.router.send_package(channel, envelope) {
            Ok(packet) => Ok(packet),
            Err(err) => {
                warn!(group_id = group.id, error = %err, "mirror package not sent");
                self.keeper.resolve_mirror(group.id, false)?;
                Err(err)
            }
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    pub fn keeper_mut(&mut self) -> &mut Keeper {
        &mut self.keeper
    }

    pub fn dispatcher(&self) -> &PackageDispatcher {
        &self.dispatcher
    }

    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }
}

impl std::fmt::Debug for GroupModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupModule")
            .field("consensus_version", &self.consensus_version)
            .field("dispatcher", &self.dispatcher)
            .field("router", &self.router)
            .field("groups", &self.keeper.group_count())
            .finish()
    }
}
