//! # Membership Protocol
//!
//! Versioned cross-chain group membership: a channel between two chains that
//! carries group mutations as ABI-encoded packages, the state machine that
//! applies them, and the in-place migration that moves the channel to a new
//! package schema.
//!
//! ## Layers
//! - [`core`]: ABI tuple codec, address and uint256 primitives, relay frames
//! - [`protocol`]: package envelope, decoder registry, channel applications, router
//! - [`membership`]: keeper, member store, permissions, events, messages, queries
//! - [`module`] / [`upgrade`]: composition root and governance hooks
//!
//! ## Example
//! ```rust
//! use membership_protocol::config::ProtocolConfig;
//! use membership_protocol::module::GroupModule;
//!
//! let mut module = GroupModule::new(ProtocolConfig::default()).unwrap();
//! assert_eq!(module.consensus_version(), 1);
//! module.on_upgrade_init().unwrap();
//! assert_eq!(module.consensus_version(), 2);
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod membership;
pub mod module;
pub mod protocol;
pub mod upgrade;
pub mod utils;

pub use crate::config::ProtocolConfig;
pub use crate::context::BlockContext;
pub use crate::core::packet::Packet;
pub use crate::core::primitives::{Address, U256};
pub use crate::error::{ProtocolError, Result};
pub use crate::membership::Keeper;
pub use crate::module::GroupModule;
pub use crate::upgrade::{ModuleVersionMap, UpgradePlan};
