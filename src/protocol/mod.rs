//! # Cross-Chain Protocol
//!
//! Package envelope, typed packages, decoder registry, channel applications
//! and the channel router.

pub mod app;
pub mod app_v2;
pub mod channel;
pub mod dispatcher;
pub mod message;
pub mod package;
pub mod schemas;

pub use app::{AppContext, CrossChainApplication, ExecuteResult, GroupApp};
pub use app_v2::GroupAppV2;
pub use channel::{ChannelRouter, Delivery};
pub use dispatcher::PackageDispatcher;
pub use message::CrossChainPayload;
pub use package::{AckStatus, CrossChainPackage, PackageType, SchemaVersion};
