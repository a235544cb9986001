//! # Membership Engine
//!
//! Group state, membership relations and the rules that mutate them.
//!
//! ## Components
//! - **Types**: group and member records, mutation options
//! - **Store**: `MemberStore` trait and its in-memory implementation
//! - **Permission**: `PermissionVerifier` seam and the policy-based verifier
//! - **Events**: typed group events with transactional rollback
//! - **Keeper**: transactional application of every mutation
//! - **Msg / MsgServer / Query**: same-chain entry points
//!
//! ## Expiry
//! Member expiration is evaluated lazily: a member whose expiration lies
//! before the block time is ignored by authorization but its record is kept.

pub mod events;
pub mod keeper;
pub mod msg;
pub mod msg_server;
pub mod permission;
pub mod query;
pub mod store;
pub mod types;

pub use keeper::Keeper;
pub use types::{GroupInfo, GroupMember, SourceType, MAX_EXPIRATION};
