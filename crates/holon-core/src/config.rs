//! Configuration for Holon
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration for Holon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HolonConfig {
    /// Scheduling loop configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Staged collection configuration
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Mailbox configuration
    #[serde(default)]
    pub mailbox: MailboxConfig,
}

impl HolonConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.collection.validate()?;
        self.mailbox.validate()?;
        Ok(())
    }
}

/// Scheduling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between two ticks (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many live ticks (unbounded when absent)
    #[serde(default)]
    pub ticks_count_max: Option<u64>,

    /// Stop once the root was used and has nothing left to activate
    #[serde(default = "default_stop_when_idle")]
    pub stop_when_idle: bool,

    /// Number of partitions used by the live pass (1 = sequential)
    #[serde(default = "default_partitions_count")]
    pub partitions_count: usize,
}

fn default_tick_interval_ms() -> u64 {
    SCHEDULER_TICK_INTERVAL_MS_DEFAULT
}

fn default_stop_when_idle() -> bool {
    true
}

fn default_partitions_count() -> usize {
    SCHEDULER_PARTITIONS_COUNT_DEFAULT
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            ticks_count_max: None,
            stop_when_idle: default_stop_when_idle(),
            partitions_count: default_partitions_count(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms > SCHEDULER_TICK_INTERVAL_MS_MAX {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.tick_interval_ms".into(),
                reason: format!(
                    "{} exceeds limit {}",
                    self.tick_interval_ms, SCHEDULER_TICK_INTERVAL_MS_MAX
                ),
            });
        }

        if self.ticks_count_max == Some(0) {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.ticks_count_max".into(),
                reason: "must be positive when set".into(),
            });
        }

        if self.partitions_count == 0 || self.partitions_count > SCHEDULER_PARTITIONS_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.partitions_count".into(),
                reason: format!(
                    "{} must be in [1, {}]",
                    self.partitions_count, SCHEDULER_PARTITIONS_COUNT_MAX
                ),
            });
        }

        Ok(())
    }
}

/// Staged collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Maximum number of members (live plus pending)
    #[serde(default = "default_members_count_max")]
    pub members_count_max: usize,
}

fn default_members_count_max() -> usize {
    COLLECTION_MEMBERS_COUNT_MAX
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            members_count_max: default_members_count_max(),
        }
    }
}

impl CollectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.members_count_max == 0 || self.members_count_max > COLLECTION_MEMBERS_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "collection.members_count_max".into(),
                reason: format!(
                    "{} must be in [1, {}]",
                    self.members_count_max, COLLECTION_MEMBERS_COUNT_MAX
                ),
            });
        }
        Ok(())
    }
}

/// Mailbox variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailboxKind {
    /// One global buffer folded into the ordered queue
    #[default]
    Staged,

    /// One buffer per sender, folded together into the ordered queue
    PerSender,

    /// Discards every message
    BlackHole,
}

/// Mailbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Mailbox variant
    #[serde(default)]
    pub kind: MailboxKind,

    /// Maximum depth (live queue plus buffer)
    #[serde(default = "default_mailbox_depth")]
    pub depth_max: usize,
}

fn default_mailbox_depth() -> usize {
    MAILBOX_DEPTH_MAX
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            kind: MailboxKind::default(),
            depth_max: default_mailbox_depth(),
        }
    }
}

impl MailboxConfig {
    pub fn validate(&self) -> Result<()> {
        if self.depth_max == 0 || self.depth_max > MAILBOX_DEPTH_MAX {
            return Err(Error::InvalidConfiguration {
                field: "mailbox.depth_max".into(),
                reason: format!("{} must be in [1, {}]", self.depth_max, MAILBOX_DEPTH_MAX),
            });
        }
        Ok(())
    }
}
