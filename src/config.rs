//! # Configuration Management
//!
//! Centralized configuration for the membership protocol.
//!
//! This module provides structured configuration for the group channel binding,
//! the request limits enforced by `validate_basic`, the governance upgrade that
//! migrates the channel, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides (`MEMBERSHIP_PROTOCOL_*`) via `from_env()`
//!
//! ## Defaults
//! - Group channel id 6
//! - At most 20 members touched by one message
//! - Group extra metadata limited to 512 bytes
//! - Upgrade plan `BEP1001`

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Current relay frame version
pub const PROTOCOL_VERSION: u8 = 1;

/// Magic bytes identifying relay frames ("MBRP")
pub const MAGIC_BYTES: [u8; 4] = [0x4D, 0x42, 0x52, 0x50];

/// Max allowed relay frame payload (1 MB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Channel carrying group packages
pub const GROUP_CHANNEL_ID: u8 = 6;

/// Max members added, removed or expired by one message
pub const MAX_GROUP_MEMBER_LIMIT_ONCE: usize = 20;

/// Max length of a group's extra metadata
pub const MAX_GROUP_EXTRA_INFO_LIMIT: usize = 512;

/// Group name length bounds
pub const MIN_GROUP_NAME_LEN: usize = 3;
pub const MAX_GROUP_NAME_LEN: usize = 63;

/// Governance plan that migrates the group channel to the v2 handler
pub const DEFAULT_UPGRADE_PLAN: &str = "BEP1001";

/// Top-level protocol configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    /// Channel binding configuration
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Request limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Upgrade configuration
    #[serde(default)]
    pub upgrade: UpgradeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(id) = std::env::var("MEMBERSHIP_PROTOCOL_GROUP_CHANNEL_ID") {
            config.channel.group_channel_id = id.parse::<u8>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid MEMBERSHIP_PROTOCOL_GROUP_CHANNEL_ID: {e}"))
            })?;
        }

        if let Ok(limit) = std::env::var("MEMBERSHIP_PROTOCOL_MAX_MEMBERS_PER_MESSAGE") {
            if let Ok(val) = limit.parse::<usize>() {
                config.limits.max_members_per_message = val;
            }
        }

        if let Ok(limit) = std::env::var("MEMBERSHIP_PROTOCOL_MAX_EXTRA_LEN") {
            if let Ok(val) = limit.parse::<usize>() {
                config.limits.max_extra_len = val;
            }
        }

        if let Ok(size) = std::env::var("MEMBERSHIP_PROTOCOL_MAX_PACKAGE_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.limits.max_package_size = val;
            }
        }

        if let Ok(plan) = std::env::var("MEMBERSHIP_PROTOCOL_UPGRADE_PLAN") {
            config.upgrade.plan_name = plan;
        }

        if let Ok(level) = std::env::var("MEMBERSHIP_PROTOCOL_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
            }
        }

        if let Ok(json) = std::env::var("MEMBERSHIP_PROTOCOL_LOG_JSON") {
            config.logging.json_format = matches!(json.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.channel.validate());
        errors.extend(self.limits.validate());
        errors.extend(self.upgrade.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Channel binding configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Channel id the group application is bound to
    pub group_channel_id: u8,

    /// Human-readable channel name used in logs
    pub group_channel_name: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            group_channel_id: GROUP_CHANNEL_ID,
            group_channel_name: String::from("group"),
        }
    }
}

impl ChannelConfig {
    /// Validate channel configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.group_channel_id == 0 {
            errors.push("Group channel id 0 is reserved".to_string());
        }

        if self.group_channel_name.is_empty() {
            errors.push("Group channel name cannot be empty".to_string());
        }

        errors
    }
}

/// Limits enforced on same-chain messages and inbound packages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Max members touched by a single message
    pub max_members_per_message: usize,

    /// Max length of group extra metadata in bytes
    pub max_extra_len: usize,

    /// Max size of a cross-chain package envelope in bytes
    pub max_package_size: usize,

    /// Minimum group name length
    pub min_group_name_len: usize,

    /// Maximum group name length
    pub max_group_name_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_members_per_message: MAX_GROUP_MEMBER_LIMIT_ONCE,
            max_extra_len: MAX_GROUP_EXTRA_INFO_LIMIT,
            max_package_size: 64 * 1024,
            min_group_name_len: MIN_GROUP_NAME_LEN,
            max_group_name_len: MAX_GROUP_NAME_LEN,
        }
    }
}

impl LimitsConfig {
    /// Validate request limits
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_members_per_message == 0 {
            errors.push("Max members per message must be greater than 0".to_string());
        } else if self.max_members_per_message > 1000 {
            errors.push(format!(
                "Max members per message too large: {} (maximum: 1000)",
                self.max_members_per_message
            ));
        }

        if self.max_extra_len > 64 * 1024 {
            errors.push(format!(
                "Max extra length too large: {} bytes (maximum: 64 KB)",
                self.max_extra_len
            ));
        }

        if self.max_package_size < 1024 {
            errors.push("Max package size too small (minimum: 1 KB)".to_string());
        } else if self.max_package_size > MAX_PAYLOAD_SIZE {
            errors.push(format!(
                "Max package size {} exceeds relay frame limit {}",
                self.max_package_size, MAX_PAYLOAD_SIZE
            ));
        }

        if self.min_group_name_len == 0 {
            errors.push("Min group name length must be greater than 0".to_string());
        }
        if self.min_group_name_len > self.max_group_name_len {
            errors.push(format!(
                "Min group name length {} is larger than max {}",
                self.min_group_name_len, self.max_group_name_len
            ));
        }

        errors
    }
}

/// Governance upgrade configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpgradeConfig {
    /// Plan name that triggers the channel migration
    pub plan_name: String,

    /// Block height at which the plan activates, if scheduled
    pub height: Option<u64>,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            plan_name: String::from(DEFAULT_UPGRADE_PLAN),
            height: None,
        }
    }
}

impl UpgradeConfig {
    /// Validate upgrade configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.plan_name.trim().is_empty() {
            errors.push("Upgrade plan name cannot be empty".to_string());
        }

        if self.height == Some(0) {
            errors.push("Upgrade height must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("membership-protocol"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
