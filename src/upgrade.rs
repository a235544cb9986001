//! # Upgrade Hooks
//!
//! Governance entry points that move the group module to version 2.
//!
//! `on_upgrade_init` runs once when a node starts past the upgrade height;
//! `on_upgrade_apply` runs inside the upgrade block. Both reach the same
//! state and either may run after the other.

use crate::error::{ProtocolError, Result};
use crate::module::GroupModule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Name the group module is recorded under in a [`ModuleVersionMap`]
pub const MODULE_NAME: &str = "storage";

/// Consensus version per module name
pub type ModuleVersionMap = BTreeMap<String, u64>;

/// Scheduled governance upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradePlan {
    pub name: String,
    pub height: u64,
    #[serde(default)]
    pub info: String,
}

impl UpgradePlan {
    pub fn new(name: impl Into<String>, height: u64) -> Self {
        Self {
            name: name.into(),
            height,
            info: String::new(),
        }
    }
}

impl GroupModule {
    pub fn on_upgrade_init(&mut self) -> Result<()> {
        info!(plan = %self.config().upgrade.plan_name, "init upgrade");
        self.migrate_to_v2().map(|_| ())
    }

    /// Apply `plan` and return the version map with this module's new version.
    pub fn on_upgrade_apply(
        &mut self,
        plan: &UpgradePlan,
        from_vm: ModuleVersionMap,
    ) -> Result<ModuleVersionMap> {
        let upgrade = &self.config().upgrade;
        if plan.name != upgrade.plan_name {
            return Err(ProtocolError::UnknownUpgrade(plan.name.clone()));
        }
        if let Some(height) = upgrade.height {
            if plan.height != height {
                return Err(ProtocolError::UnknownUpgrade(format!(
                    "{} at height {}, scheduled at {height}",
                    plan.name, plan.height
                )));
            }
        }

        info!(plan = %plan.name, height = plan.height, "upgrade to {}", plan.name);
        self.migrate_to_v2()?;

        let mut vm = from_vm;
        vm.insert(MODULE_NAME.to_string(), self.consensus_version());
        Ok(vm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProtocolConfig, DEFAULT_UPGRADE_PLAN};
    use crate::module::CONSENSUS_VERSION_V2;

    #[test]
    fn test_init_then_apply_converge() {
        let mut module = GroupModule::new(ProtocolConfig::default()).unwrap();
        module.on_upgrade_init().unwrap();
        let entries = module.dispatcher().entry_count().unwrap();

        let vm = module
            .on_upgrade_apply(&UpgradePlan::new(DEFAULT_UPGRADE_PLAN, 100), ModuleVersionMap::new())
            .unwrap();
        assert_eq!(vm.get(MODULE_NAME), Some(&CONSENSUS_VERSION_V2));
        assert_eq!(module.dispatcher().entry_count().unwrap(), entries);
    }

    #[test]
    fn test_unknown_plan_rejected() {
        let mut module = GroupModule::new(ProtocolConfig::default()).unwrap();
        let err = module
            .on_upgrade_apply(&UpgradePlan::new("Other", 1), ModuleVersionMap::new())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownUpgrade(_)));
        assert_eq!(module.consensus_version(), 1);
    }
}
