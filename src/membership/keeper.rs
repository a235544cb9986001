//! # Membership Keeper
//!
//! Owns group state and applies every group mutation.
//!
//! ## State
//! - groups by id, plus an `(owner, name)` index
//! - the next group id; ids are never reused
//! - a [`MemberStore`] for relations and member extras
//! - a [`PermissionVerifier`] consulted before mutations by non-owners
//! - the [`EventManager`] collecting emitted events
//!
//! ## Transactions
//! Every mutation runs inside [`Keeper::transact`]. A transaction journals the
//! prior value of each group it touches, the id counter and the event
//! checkpoint, and the member store journals its own writes. On failure the
//! journal is replayed backwards, so no partial write and no event of a failed
//! mutation survives. Transactions nest.

use crate::core::primitives::Address;
use crate::error::{constants, ProtocolError, Result};
use crate::membership::events::{EventManager, GroupEvent};
use crate::membership::permission::{Action, Effect, PermissionVerifier, PolicyVerifier};
use crate::membership::store::{MemberStore, MemoryMemberStore};
use crate::membership::types::{
    CreateGroupOptions, DeleteGroupOptions, GroupInfo, GroupMember, LeaveGroupOptions,
    MsgGroupMember, SourceType, UpdateGroupMemberOptions, MAX_EXPIRATION,
};
use crate::utils::metrics::global_metrics;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Id assigned to the first group
const FIRST_GROUP_ID: u64 = 1;

pub struct Keeper {
    groups: BTreeMap<u64, GroupInfo>,
    group_names: BTreeMap<(Address, String), u64>,
    next_group_id: u64,
    members: Box<dyn MemberStore>,
    verifier: Box<dyn PermissionVerifier>,
    events: EventManager,
    journal: Vec<JournalFrame>,
}

/// Undo information for one open transaction.
struct JournalFrame {
    groups: BTreeMap<u64, Option<GroupInfo>>,
    next_group_id: u64,
    events: usize,
}

impl Default for Keeper {
    fn default() -> Self {
        Self::new(
            Box::new(MemoryMemberStore::new()),
            Box::new(PolicyVerifier::new()),
        )
    }
}

impl Keeper {
    pub fn new(members: Box<dyn MemberStore>, verifier: Box<dyn PermissionVerifier>) -> Self {
        Self {
            groups: BTreeMap::new(),
            group_names: BTreeMap::new(),
            next_group_id: FIRST_GROUP_ID,
            members,
            verifier,
            events: EventManager::new(),
            journal: Vec::new(),
        }
    }

    fn begin(&mut self) {
        self.journal.push(JournalFrame {
            groups: BTreeMap::new(),
            next_group_id: self.next_group_id,
            events: self.events.checkpoint(),
        });
        self.members.begin();
    }

    fn commit(&mut self) {
        self.members.commit();
        let Some(frame) = self.journal.pop() else {
            return;
        };
        if let Some(outer) = self.journal.last_mut() {
            for (id, prior) in frame.groups {
                outer.groups.entry(id).or_insert(prior);
            }
        }
    }

    fn rollback(&mut self) {
        self.members.rollback();
        let Some(frame) = self.journal.pop() else {
            return;
        };
        for (id, prior) in frame.groups {
            if let Some(current) = self.groups.remove(&id) {
                self.group_names.remove(&(current.owner, current.group_name));
            }
            if let Some(group) = prior {
                self.group_names
                    .insert((group.owner, group.group_name.clone()), id);
                self.groups.insert(id, group);
            }
        }
        self.next_group_id = frame.next_group_id;
        self.events.rollback(frame.events);
    }

    /// Journal the current value of group `id` before it is written.
    fn touch_group(&mut self, id: u64) {
        let prior = self.groups.get(&id).cloned();
        if let Some(frame) = self.journal.last_mut() {
            frame.groups.entry(id).or_insert(prior);
        }
    }

    /// Run `f` atomically: on error every change it made is discarded.
    pub fn transact<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin();
        match f(self) {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(err) => {
                self.rollback();
                global_metrics().rollback();
                debug!(error = %err, "mutation rolled back");
                Err(err)
            }
        }
    }

    /// Create a group and its initial members. Returns the new group id.
    #[instrument(skip(self, opts), fields(%owner, source = %opts.source_type))]
    pub fn create_group(
        &mut self,
        owner: Address,
        group_name: &str,
        opts: CreateGroupOptions,
    ) -> Result<u64> {
        self.transact(|k| {
            let key = (owner, group_name.to_string());
            if k.group_names.contains_key(&key) {
                return Err(ProtocolError::AlreadyExists(format!(
                    "{}: {group_name} owned by {owner}",
                    constants::ERR_GROUP_ALREADY_EXISTS
                )));
            }

            let id = k.next_group_id;
            k.next_group_id += 1;
            let group = GroupInfo {
                id,
                owner,
                group_name: group_name.to_string(),
                source_type: opts.source_type,
                extra: opts.extra.clone(),
            };
            k.touch_group(id);
            k.groups.insert(id, group);
            k.group_names.insert(key, id);

            let mut members_detail =
                Vec::with_capacity(opts.members.len() + opts.members_with_expiration.len());
            for member in &opts.members {
                let address: Address = member.parse()?;
                k.members.add_member(id, address)?;
                members_detail.push(MsgGroupMember::new(member.clone(), MAX_EXPIRATION));
            }
            for member in &opts.members_with_expiration {
                let address: Address = member.member.parse()?;
                k.members
                    .add_member_with_expiration(id, address, member.expiration_time)?;
                members_detail.push(member.clone());
            }

            k.events.emit(GroupEvent::GroupCreated {
                owner,
                group_name: group_name.to_string(),
                group_id: id,
                source_type: opts.source_type,
                members: opts.members,
                extra: opts.extra,
                members_detail,
            });
            global_metrics().group_created();
            info!(group_id = id, group_name, "group created");
            Ok(id)
        })
    }

    /// Add, remove and expire members of a group in one atomic step.
    ///
    /// Plain additions go first, then removals (removing a non-member is a
    /// no-op), then additions with expiration, which overwrite an existing
    /// member's expiration.
    #[instrument(skip(self, opts, now), fields(%operator, source = %opts.source_type))]
    pub fn update_group_member(
        &mut self,
        operator: Address,
        group_id: u64,
        opts: UpdateGroupMemberOptions,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.transact(|k| {
            let group = k.require_group(group_id)?.clone();
            if group.source_type != opts.source_type {
                return Err(ProtocolError::SourceTypeMismatch);
            }

            let effect = k.verify_group_permission(&group, &operator, Action::UpdateGroupMember, now);
            if effect != Effect::Allow {
                return Err(ProtocolError::AccessDenied(format!(
                    "the operator({operator}) has no UpdateGroupMember permission of the group({}), owner({})",
                    group.group_name, group.owner
                )));
            }

            let mut added_members_detail =
                Vec::with_capacity(opts.members_to_add.len() + opts.members_with_expiration.len());
            for member in &opts.members_to_add {
                let address: Address = member.parse()?;
                k.members.add_member(group.id, address)?;
                added_members_detail.push(MsgGroupMember::new(member.clone(), MAX_EXPIRATION));
            }

            for member in &opts.members_to_delete {
                let address: Address = member.parse()?;
                if !k.members.remove_member(group.id, address)? {
                    debug!(group_id = group.id, %address, "delete of non-member ignored");
                }
            }

            for member in &opts.members_with_expiration {
                let address: Address = member.member.parse()?;
                k.members
                    .add_member_with_expiration(group.id, address, member.expiration_time)?;
                added_members_detail.push(member.clone());
            }

            k.events.emit(GroupEvent::GroupMemberUpdated {
                operator,
                owner: group.owner,
                group_name: group.group_name.clone(),
                group_id: group.id,
                members_to_add: opts.members_to_add,
                members_to_delete: opts.members_to_delete,
                added_members_detail,
            });
            global_metrics().member_update();
            Ok(())
        })
    }

    /// Remove `member` from the group `(owner, group_name)`, relation and extra record.
    #[instrument(skip(self, opts), fields(%member, %owner))]
    pub fn leave_group(
        &mut self,
        member: Address,
        owner: Address,
        group_name: &str,
        opts: LeaveGroupOptions,
    ) -> Result<u64> {
        self.transact(|k| {
            let group = k.require_group_by_name(&owner, group_name)?.clone();
            if group.source_type != opts.source_type {
                return Err(ProtocolError::SourceTypeMismatch);
            }

            if !k.members.remove_member(group.id, member)? {
                return Err(ProtocolError::NotFound(format!(
                    "{}: {member} in group {}",
                    constants::ERR_NO_SUCH_GROUP_MEMBER,
                    group.id
                )));
            }
            k.members.remove_member_extra(group.id, member)?;

            k.events.emit(GroupEvent::GroupMemberLeft {
                member,
                owner,
                group_name: group.group_name,
                group_id: group.id,
            });
            Ok(group.id)
        })
    }

    /// Delete the group `(owner, group_name)`. Returns the deleted id.
    pub fn delete_group(
        &mut self,
        operator: Address,
        owner: Address,
        group_name: &str,
        opts: DeleteGroupOptions,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let id = self.require_group_by_name(&owner, group_name)?.id;
        self.delete_group_by_id(operator, id, opts, now)
    }

    /// Delete a group and every member relation it holds.
    #[instrument(skip(self, opts, now), fields(%operator))]
    pub fn delete_group_by_id(
        &mut self,
        operator: Address,
        group_id: u64,
        opts: DeleteGroupOptions,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        self.transact(|k| {
            let group = k.require_group(group_id)?.clone();
            if group.source_type != opts.source_type {
                return Err(ProtocolError::SourceTypeMismatch);
            }

            let effect = k.verify_group_permission(&group, &operator, Action::DeleteGroup, now);
            if effect != Effect::Allow {
                return Err(ProtocolError::AccessDenied(format!(
                    "the operator({operator}) has no DeleteGroup permission of the group({}), owner({})",
                    group.group_name, group.owner
                )));
            }

            k.touch_group(group.id);
            k.groups.remove(&group.id);
            k.group_names.remove(&(group.owner, group.group_name.clone()));
            let removed = k.members.remove_group_members(group.id)?;

            k.events.emit(GroupEvent::GroupDeleted {
                owner: group.owner,
                group_name: group.group_name,
                group_id: group.id,
            });
            global_metrics().group_deleted();
            info!(group_id = group.id, removed_members = removed, "group deleted");
            Ok(group.id)
        })
    }

    /// Mark an origin group as being mirrored to the foreign chain.
    ///
    /// Only the owner may mirror. Returns the group as it will be announced.
    #[instrument(skip(self), fields(%operator, %owner))]
    pub fn mirror_group(
        &mut self,
        operator: Address,
        owner: Address,
        group_name: &str,
    ) -> Result<GroupInfo> {
        self.transact(|k| {
            let id = k.require_group_by_name(&owner, group_name)?.id;
            let group = k.require_group_mut(id)?;
            if group.owner != operator {
                return Err(ProtocolError::AccessDenied(format!(
                    "only the owner may mirror group({})",
                    group.group_name
                )));
            }
            if group.source_type != SourceType::Origin {
                return Err(ProtocolError::SourceTypeMismatch);
            }
            group.source_type = SourceType::MirrorPending;
            Ok(group.clone())
        })
    }

    /// Resolve a pending mirror: success makes the group cross-chain, failure reverts it.
    #[instrument(skip(self))]
    pub fn resolve_mirror(&mut self, group_id: u64, success: bool) -> Result<()> {
        self.transact(|k| {
            let group = k.require_group_mut(group_id)?;
            if group.source_type != SourceType::MirrorPending {
                return Err(ProtocolError::SourceTypeMismatch);
            }
            group.source_type = if success {
                SourceType::CrossChain
            } else {
                SourceType::Origin
            };
            let event = GroupEvent::GroupMirrored {
                owner: group.owner,
                group_name: group.group_name.clone(),
                group_id,
                success,
            };
            if !success {
                warn!(group_id, "group mirror failed, reverted to origin");
            }
            k.events.emit(event);
            Ok(())
        })
    }

    pub fn get_group_info(&self, owner: &Address, group_name: &str) -> Option<&GroupInfo> {
        self.group_names
            .get(&(*owner, group_name.to_string()))
            .and_then(|id| self.groups.get(id))
    }

    pub fn get_group_info_by_id(&self, group_id: u64) -> Option<&GroupInfo> {
        self.groups.get(&group_id)
    }

    /// Member record joined with its expiration, expired or not.
    pub fn get_group_member(&self, group_id: u64, member: &Address) -> Option<GroupMember> {
        let record = self.members.get_member(group_id, *member)?;
        Some(GroupMember {
            id: record.id,
            group_id: record.group_id,
            member: record.member,
            expiration_time: self.members.member_expiration(group_id, *member),
        })
    }

    /// Groups owned by `owner`, ordered by id.
    pub fn list_groups(&self, owner: &Address) -> Vec<&GroupInfo> {
        self.groups
            .values()
            .filter(|group| group.owner == *owner)
            .collect()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Id the next created group will receive
    pub fn next_group_id(&self) -> u64 {
        self.next_group_id
    }

    /// Authorization-time membership check: present and not expired at `now`.
    pub fn is_active_member(&self, group_id: u64, member: &Address, now: DateTime<Utc>) -> bool {
        self.members.is_active_member(group_id, *member, now)
    }

    pub fn verify_group_permission(
        &self,
        group: &GroupInfo,
        operator: &Address,
        action: Action,
        now: DateTime<Utc>,
    ) -> Effect {
        self.verifier
            .verify_group_permission(group, operator, action, self.members.as_ref(), now)
    }

    pub fn members(&self) -> &dyn MemberStore {
        self.members.as_ref()
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    fn require_group(&self, group_id: u64) -> Result<&GroupInfo> {
        self.groups.get(&group_id).ok_or_else(|| {
            ProtocolError::NotFound(format!("{}: id {group_id}", constants::ERR_NO_SUCH_GROUP))
        })
    }

    fn require_group_mut(&mut self, group_id: u64) -> Result<&mut GroupInfo> {
        self.touch_group(group_id);
        self.groups.get_mut(&group_id).ok_or_else(|| {
            ProtocolError::NotFound(format!("{}: id {group_id}", constants::ERR_NO_SUCH_GROUP))
        })
    }

    fn require_group_by_name(&self, owner: &Address, group_name: &str) -> Result<&GroupInfo> {
        self.get_group_info(owner, group_name).ok_or_else(|| {
            ProtocolError::NotFound(format!(
                "{}: {group_name} owned by {owner}",
                constants::ERR_NO_SUCH_GROUP
            ))
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::membership::types::expiration_from_unix;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn now() -> DateTime<Utc> {
        expiration_from_unix(100)
    }

    fn origin_group(keeper: &mut Keeper, owner: Address, name: &str) -> u64 {
        keeper
            .create_group(owner, name, CreateGroupOptions::default())
            .expect("create group")
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut keeper = Keeper::default();
        let a = origin_group(&mut keeper, addr(1), "alpha");
        keeper
            .delete_group_by_id(
                addr(1),
                a,
                DeleteGroupOptions {
                    source_type: SourceType::Origin,
                },
                now(),
            )
            .expect("delete");
        let b = origin_group(&mut keeper, addr(1), "alpha");
        assert!(b > a);
    }

    #[test]
    fn test_duplicate_name_leaves_no_record() {
        let mut keeper = Keeper::default();
        origin_group(&mut keeper, addr(1), "alpha");
        let next = keeper.next_group_id();
        let err = keeper
            .create_group(addr(1), "alpha", CreateGroupOptions::default())
            .expect_err("duplicate");
        assert!(matches!(err, ProtocolError::AlreadyExists(_)));
        assert_eq!(keeper.group_count(), 1);
        assert_eq!(keeper.next_group_id(), next);
        assert_eq!(keeper.events().len(), 1);
    }

    #[test]
    fn test_bad_member_rolls_back_create() {
        let mut keeper = Keeper::default();
        let opts = CreateGroupOptions {
            members: vec![addr(2).to_string(), "0xnotanaddress".to_string()],
            ..CreateGroupOptions::default()
        };
        let err = keeper.create_group(addr(1), "alpha", opts).expect_err("bad member");
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
        assert_eq!(keeper.group_count(), 0);
        assert!(keeper.get_group_member(FIRST_GROUP_ID, &addr(2)).is_none());
        assert!(keeper.events().is_empty());
    }

    #[test]
    fn test_update_requires_permission_and_source() {
        let mut keeper = Keeper::default();
        let id = origin_group(&mut keeper, addr(1), "alpha");

        let mut opts = UpdateGroupMemberOptions::new(SourceType::Origin);
        opts.members_to_add.push(addr(5).to_string());
        let err = keeper
            .update_group_member(addr(9), id, opts.clone(), now())
            .expect_err("stranger");
        assert!(matches!(err, ProtocolError::AccessDenied(_)));

        opts.source_type = SourceType::CrossChain;
        let err = keeper
            .update_group_member(addr(1), id, opts, now())
            .expect_err("mismatch");
        assert!(matches!(err, ProtocolError::SourceTypeMismatch));
        assert!(keeper.get_group_member(id, &addr(5)).is_none());
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut keeper = Keeper::default();
        let id = origin_group(&mut keeper, addr(1), "alpha");
        let mut opts = UpdateGroupMemberOptions::new(SourceType::Origin);
        opts.members_to_add = vec![addr(2).to_string(), addr(2).to_string()];

        let err = keeper
            .update_group_member(addr(1), id, opts, now())
            .expect_err("duplicate add");
        assert!(matches!(err, ProtocolError::AlreadyExists(_)));
        assert!(keeper.get_group_member(id, &addr(2)).is_none());
    }

    #[test]
    fn test_leave_group_requires_membership() {
        let mut keeper = Keeper::default();
        let opts = CreateGroupOptions {
            members_with_expiration: vec![MsgGroupMember::new(
                addr(3).to_string(),
                expiration_from_unix(5000),
            )],
            ..CreateGroupOptions::default()
        };
        let id = keeper.create_group(addr(1), "alpha", opts).expect("create");
        let leave = LeaveGroupOptions {
            source_type: SourceType::Origin,
        };

        keeper.leave_group(addr(3), addr(1), "alpha", leave).expect("leave");
        assert!(keeper.get_group_member(id, &addr(3)).is_none());
        assert!(keeper.members().get_member_extra(id, addr(3)).is_none());

        let err = keeper
            .leave_group(addr(3), addr(1), "alpha", leave)
            .expect_err("no longer a member");
        assert!(matches!(err, ProtocolError::NotFound(_)));
    }

    #[test]
    fn test_mirror_lifecycle() {
        let mut keeper = Keeper::default();
        let id = origin_group(&mut keeper, addr(1), "alpha");

        assert!(matches!(
            keeper.mirror_group(addr(2), addr(1), "alpha"),
            Err(ProtocolError::AccessDenied(_))
        ));

        let group = keeper.mirror_group(addr(1), addr(1), "alpha").expect("mirror");
        assert_eq!(group.source_type, SourceType::MirrorPending);
        keeper.resolve_mirror(id, false).expect("fail ack");
        assert_eq!(
            keeper.get_group_info_by_id(id).expect("group").source_type,
            SourceType::Origin
        );

        keeper.mirror_group(addr(1), addr(1), "alpha").expect("mirror again");
        keeper.resolve_mirror(id, true).expect("ack");
        assert_eq!(
            keeper.get_group_info_by_id(id).expect("group").source_type,
            SourceType::CrossChain
        );
        assert!(keeper.resolve_mirror(id, true).is_err());
    }

    #[test]
    fn test_failed_delete_restores_group_and_members() {
        let mut keeper = Keeper::default();
        let opts = CreateGroupOptions {
            members: vec![addr(2).to_string()],
            ..CreateGroupOptions::default()
        };
        let id = keeper.create_group(addr(1), "alpha", opts).expect("create");
        let delete = DeleteGroupOptions {
            source_type: SourceType::Origin,
        };

        let err = keeper
            .transact(|k| {
                k.delete_group_by_id(addr(1), id, delete, now())?;
                k.create_group(addr(1), "beta", CreateGroupOptions::default())?;
                Err::<(), _>(ProtocolError::Custom("abort".to_string()))
            })
            .expect_err("aborted");
        assert!(matches!(err, ProtocolError::Custom(_)));

        assert_eq!(keeper.get_group_info(&addr(1), "alpha").expect("restored").id, id);
        assert!(keeper.get_group_info(&addr(1), "beta").is_none());
        assert!(keeper.get_group_member(id, &addr(2)).is_some());
        assert_eq!(keeper.next_group_id(), id + 1);
        assert_eq!(keeper.events().len(), 1);
    }

    #[test]
    fn test_nested_transactions_commit_together() {
        let mut keeper = Keeper::default();
        let id = keeper
            .transact(|k| {
                let id = origin_group(k, addr(1), "alpha");
                k.mirror_group(addr(1), addr(1), "alpha")?;
                Ok(id)
            })
            .expect("outer commit");

        assert_eq!(
            keeper.get_group_info_by_id(id).expect("group").source_type,
            SourceType::MirrorPending
        );
        assert_eq!(keeper.events().len(), 1);

        // a failed inner mutation leaves the outer one intact
        keeper
            .transact(|k| {
                assert!(k.resolve_mirror(id + 7, true).is_err());
                k.resolve_mirror(id, true)
            })
            .expect("outer commit");
        assert_eq!(
            keeper.get_group_info_by_id(id).expect("group").source_type,
            SourceType::CrossChain
        );
    }
}
