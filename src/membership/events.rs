//! # Group Events
//!
//! Typed domain events emitted by the keeper and collected by [`EventManager`].
//!
//! Events written during a failed mutation are discarded together with the
//! state changes: the keeper takes a [`EventManager::checkpoint`] before the
//! mutation and calls [`EventManager::rollback`] on error. Indexers consume the
//! committed events with [`EventManager::drain`] or export them in one of the
//! [`SerializationFormat`]s.

use crate::core::primitives::Address;
use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::error::Result;
use crate::membership::types::{MsgGroupMember, SourceType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    GroupCreated {
        owner: Address,
        group_name: String,
        group_id: u64,
        source_type: SourceType,
        members: Vec<String>,
        extra: String,
        /// Every added member; plain members carry the max expiration
        members_detail: Vec<MsgGroupMember>,
    },
    GroupMemberUpdated {
        operator: Address,
        owner: Address,
        group_name: String,
        group_id: u64,
        members_to_add: Vec<String>,
        members_to_delete: Vec<String>,
        added_members_detail: Vec<MsgGroupMember>,
    },
    GroupDeleted {
        owner: Address,
        group_name: String,
        group_id: u64,
    },
    GroupMemberLeft {
        member: Address,
        owner: Address,
        group_name: String,
        group_id: u64,
    },
    GroupMirrored {
        owner: Address,
        group_name: String,
        group_id: u64,
        success: bool,
    },
}

impl GroupEvent {
    /// Event type name as seen by indexers
    pub fn kind(&self) -> &'static str {
        match self {
            GroupEvent::GroupCreated { .. } => "EventCreateGroup",
            GroupEvent::GroupMemberUpdated { .. } => "EventUpdateGroupMember",
            GroupEvent::GroupDeleted { .. } => "EventDeleteGroup",
            GroupEvent::GroupMemberLeft { .. } => "EventLeaveGroup",
            GroupEvent::GroupMirrored { .. } => "EventMirrorGroupResult",
        }
    }

    pub fn group_id(&self) -> u64 {
        match self {
            GroupEvent::GroupCreated { group_id, .. }
            | GroupEvent::GroupMemberUpdated { group_id, .. }
            | GroupEvent::GroupDeleted { group_id, .. }
            | GroupEvent::GroupMemberLeft { group_id, .. }
            | GroupEvent::GroupMirrored { group_id, .. } => *group_id,
        }
    }
}

impl MultiFormat for GroupEvent {}

#[derive(Debug, Clone, Default)]
pub struct EventManager {
    events: Vec<GroupEvent>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: GroupEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[GroupEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Position to roll back to.
    pub fn checkpoint(&self) -> usize {
        self.events.len()
    }

    /// Discard every event emitted after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: usize) {
        self.events.truncate(checkpoint);
    }

    /// Hand the committed events to a consumer.
    pub fn drain(&mut self) -> Vec<GroupEvent> {
        std::mem::take(&mut self.events)
    }

    /// Serialize every pending event with a format header.
    pub fn export(&self, format: SerializationFormat) -> Result<Vec<Vec<u8>>> {
        self.events
            .iter()
            .map(|event| event.serialize_with_header(format))
            .collect()
    }
}
