//! # Member Store
//!
//! Storage of membership relations and their optional extra records.
//!
//! The relation `(group id, member)` and the extra record holding the member's
//! expiration are kept apart: a member without an extra never expires.
//!
//! ## Transactions
//! The keeper brackets every mutation with [`MemberStore::begin`] and either
//! [`MemberStore::commit`] or [`MemberStore::rollback`]. Frames nest. A store
//! only has to remember the prior value of the keys a frame writes, so the
//! cost of a rollback follows the size of the mutation, not of the store.

use crate::core::primitives::Address;
use crate::error::{constants, ProtocolError, Result};
use crate::membership::types::{GroupMemberExtra, MemberRecord, MAX_EXPIRATION};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

pub trait MemberStore: Send + Sync {
    /// Add a member without expiration. Fails when the relation already exists.
    fn add_member(&mut self, group_id: u64, member: Address) -> Result<u64>;

    /// Add the member if absent, then set its expiration.
    fn add_member_with_expiration(
        &mut self,
        group_id: u64,
        member: Address,
        expiration: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove the relation together with its extra record.
    /// Returns whether a relation was removed.
    fn remove_member(&mut self, group_id: u64, member: Address) -> Result<bool>;

    /// Remove the extra record only. Removing an absent record succeeds.
    fn remove_member_extra(&mut self, group_id: u64, member: Address) -> Result<()>;

    fn get_member(&self, group_id: u64, member: Address) -> Option<MemberRecord>;

    fn get_member_extra(&self, group_id: u64, member: Address) -> Option<GroupMemberExtra>;

    fn members_of(&self, group_id: u64) -> Vec<Address>;

    /// Drop every relation of a group. Returns how many were removed.
    fn remove_group_members(&mut self, group_id: u64) -> Result<usize>;

    /// Open an undo frame for the writes that follow.
    fn begin(&mut self);

    /// Close the innermost frame, keeping its writes.
    fn commit(&mut self);

    /// Close the innermost frame, undoing every write made since its `begin`.
    fn rollback(&mut self);

    /// Expiration of a member, [`MAX_EXPIRATION`] when it has no extra record.
    fn member_expiration(&self, group_id: u64, member: Address) -> DateTime<Utc> {
        self.get_member_extra(group_id, member)
            .map(|extra| extra.expiration_time)
            .unwrap_or(MAX_EXPIRATION)
    }

    /// A member counts for authorization when present and not expired at `now`.
    fn is_active_member(&self, group_id: u64, member: Address, now: DateTime<Utc>) -> bool {
        self.get_member(group_id, member).is_some() && self.member_expiration(group_id, member) >= now
    }
}

type MemberKey = (u64, Address);

/// Prior values of the keys written inside one transaction frame.
#[derive(Debug, Clone, Default)]
struct UndoFrame {
    touched: BTreeMap<MemberKey, (Option<MemberRecord>, Option<GroupMemberExtra>)>,
    next_member_id: u64,
}

/// In-memory [`MemberStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryMemberStore {
    members: BTreeMap<MemberKey, MemberRecord>,
    extras: BTreeMap<MemberKey, GroupMemberExtra>,
    next_member_id: u64,
    journal: Vec<UndoFrame>,
}

impl MemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Remember the value of `key` before the first write in the open frame.
    fn record(&mut self, key: MemberKey) {
        let prior = (self.members.get(&key).copied(), self.extras.get(&key).copied());
        if let Some(frame) = self.journal.last_mut() {
            frame.touched.entry(key).or_insert(prior);
        }
    }

    fn insert(&mut self, group_id: u64, member: Address) -> u64 {
        self.record((group_id, member));
        self.next_member_id += 1;
        let id = self.next_member_id;
        self.members.insert(
            (group_id, member),
            MemberRecord {
                id,
                group_id,
                member,
            },
        );
        id
    }
}

impl MemberStore for MemoryMemberStore {
    fn add_member(&mut self, group_id: u64, member: Address) -> Result<u64> {
        if self.members.contains_key(&(group_id, member)) {
            return Err(ProtocolError::AlreadyExists(format!(
                "{}: {member} in group {group_id}",
                constants::ERR_GROUP_MEMBER_ALREADY_EXISTS
            )));
        }
        let id = self.insert(group_id, member);
        debug!(group_id, %member, id, "member added");
        Ok(id)
    }

    fn add_member_with_expiration(
        &mut self,
        group_id: u64,
        member: Address,
        expiration: DateTime<Utc>,
    ) -> Result<()> {
        self.record((group_id, member));
        if !self.members.contains_key(&(group_id, member)) {
            self.insert(group_id, member);
        }
        self.extras.insert(
            (group_id, member),
            GroupMemberExtra {
                expiration_time: expiration,
            },
        );
        debug!(group_id, %member, %expiration, "member expiration set");
        Ok(())
    }

    fn remove_member(&mut self, group_id: u64, member: Address) -> Result<bool> {
        self.record((group_id, member));
        self.extras.remove(&(group_id, member));
        Ok(self.members.remove(&(group_id, member)).is_some())
    }

    fn remove_member_extra(&mut self, group_id: u64, member: Address) -> Result<()> {
        self.record((group_id, member));
        self.extras.remove(&(group_id, member));
        Ok(())
    }

    fn get_member(&self, group_id: u64, member: Address) -> Option<MemberRecord> {
        self.members.get(&(group_id, member)).copied()
    }

    fn get_member_extra(&self, group_id: u64, member: Address) -> Option<GroupMemberExtra> {
        self.extras.get(&(group_id, member)).copied()
    }

    fn members_of(&self, group_id: u64) -> Vec<Address> {
        self.members
            .range((group_id, Address::ZERO)..=(group_id, Address::new([0xFF; 20])))
            .map(|((_, member), _)| *member)
            .collect()
    }

    fn remove_group_members(&mut self, group_id: u64) -> Result<usize> {
        let members = self.members_of(group_id);
        for member in &members {
            self.record((group_id, *member));
            self.members.remove(&(group_id, *member));
            self.extras.remove(&(group_id, *member));
        }
        Ok(members.len())
    }

    fn begin(&mut self) {
        self.journal.push(UndoFrame {
            touched: BTreeMap::new(),
            next_member_id: self.next_member_id,
        });
    }

    fn commit(&mut self) {
        let Some(frame) = self.journal.pop() else {
            return;
        };
        // the enclosing frame keeps the oldest value of each key
        if let Some(outer) = self.journal.last_mut() {
            for (key, prior) in frame.touched {
                outer.touched.entry(key).or_insert(prior);
            }
        }
    }

    fn rollback(&mut self) {
        let Some(frame) = self.journal.pop() else {
            return;
        };
        for (key, (record, extra)) in frame.touched {
            match record {
                Some(record) => self.members.insert(key, record),
                None => self.members.remove(&key),
            };
            match extra {
                Some(extra) => self.extras.insert(key, extra),
                None => self.extras.remove(&key),
            };
        }
        self.next_member_id = frame.next_member_id;
        debug!(depth = self.journal.len(), "member store rolled back");
    }
}
