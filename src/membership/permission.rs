//! # Group Permissions
//!
//! Authorization for group mutations.
//!
//! [`PermissionVerifier`] is the seam the keeper consults before mutating a
//! group; anything other than [`Effect::Allow`] is a deny. [`PolicyVerifier`]
//! is the in-memory implementation:
//!
//! - the group owner is allowed every action
//! - an explicit `Deny` grant wins over any `Allow` grant
//! - a grant to a group principal matches operators that are active members of
//!   that group at `now`; expired members do not match

use crate::core::primitives::Address;
use crate::membership::store::MemberStore;
use crate::membership::types::GroupInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    UpdateGroupMember,
    DeleteGroup,
    UpdateGroupExtra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
    Unspecified,
}

pub trait PermissionVerifier: Send + Sync {
    fn verify_group_permission(
        &self,
        group: &GroupInfo,
        operator: &Address,
        action: Action,
        members: &dyn MemberStore,
        now: DateTime<Utc>,
    ) -> Effect;
}

/// Who a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    Account(Address),
    /// Every active member of the group with this id
    Group(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub group_id: u64,
    pub principal: Principal,
    pub actions: Vec<Action>,
    pub effect: Effect,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyVerifier {
    grants: Vec<Grant>,
}

impl PolicyVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant on `group_id`.
    pub fn grant(&mut self, group_id: u64, principal: Principal, actions: &[Action], effect: Effect) {
        self.grants.push(Grant {
            group_id,
            principal,
            actions: actions.to_vec(),
            effect,
        });
    }

    /// Drop every grant attached to a group.
    pub fn revoke_group(&mut self, group_id: u64) {
        self.grants.retain(|grant| grant.group_id != group_id);
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    fn matches(
        grant: &Grant,
        operator: &Address,
        members: &dyn MemberStore,
        now: DateTime<Utc>,
    ) -> bool {
        match grant.principal {
            Principal::Account(account) => account == *operator,
            Principal::Group(principal) => members.is_active_member(principal, *operator, now),
        }
    }
}

impl PermissionVerifier for PolicyVerifier {
    fn verify_group_permission(
        &self,
        group: &GroupInfo,
        operator: &Address,
        action: Action,
        members: &dyn MemberStore,
        now: DateTime<Utc>,
    ) -> Effect {
        if group.owner == *operator {
            return Effect::Allow;
        }

        let mut effect = Effect::Unspecified;
        for grant in self
            .grants
            .iter()
            .filter(|g| g.group_id == group.id && g.actions.contains(&action))
        {
            if !Self::matches(grant, operator, members, now) {
                continue;
            }
            match grant.effect {
                Effect::Deny => {
                    effect = Effect::Deny;
                    break;
                }
                Effect::Allow => effect = Effect::Allow,
                Effect::Unspecified => {}
            }
        }

        debug!(group_id = group.id, %operator, ?action, ?effect, "verified group permission");
        effect
    }
}
