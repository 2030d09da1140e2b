//! Outbound Equip Jobs
//!
//! The engine decides what to equip and whether to interrupt; the host job
//! system executes the pickup and revalidates the target on its own.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, JobId, Tick, WeaponDefId, WeaponId};

/// Which equipment slot a job targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EquipSlot {
    Primary,
    /// Inventory sidearm, optionally replacing a carried sidearm
    Sidearm {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replaces: Option<WeaponId>,
    },
}

impl EquipSlot {
    pub fn is_primary(&self) -> bool {
        matches!(self, EquipSlot::Primary)
    }
}

/// A request for the host to move an agent to a weapon and equip it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipJob {
    pub job_id: JobId,
    pub agent: AgentId,
    pub target_weapon: WeaponId,
    pub target_def: WeaponDefId,
    pub slot: EquipSlot,
    /// Player-forced jobs are never produced by the engine; kept for the host contract
    pub is_forced: bool,
    pub is_auto_generated: bool,
    /// Tick after which the host should drop the job, `None` for no expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Tick>,
    /// Whether the host should interrupt the agent's current activity
    pub interrupt_current: bool,
}

/// Why an equip job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Path blocked or target unreachable
    Unreachable,
    /// Someone else took the weapon first
    TargetGone,
    /// Equipment is permanently restricted for this agent (body size, gender, ...)
    Restricted,
    /// Restricted only by a temporary body state (missing hand while healing, ...)
    TemporarilyRestricted,
    Other,
}

impl FailureReason {
    /// Temporary restrictions may lift on their own and never count towards a blacklist.
    pub fn is_temporary(self) -> bool {
        matches!(self, FailureReason::TemporarilyRestricted)
    }
}

/// How an engine-issued job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed(FailureReason),
    /// Interrupted or expired before completion
    Abandoned,
}

/// User-facing message about an automatic equip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Equipped {
        agent: AgentId,
        weapon: WeaponDefId,
    },
    Upgraded {
        agent: AgentId,
        from: WeaponDefId,
        to: WeaponDefId,
    },
}

impl Notification {
    pub fn agent(&self) -> AgentId {
        match self {
            Notification::Equipped { agent, .. } | Notification::Upgraded { agent, .. } => *agent,
        }
    }

    /// Human-readable text for the message.
    pub fn text(&self, agent_name: &str) -> String {
        match self {
            Notification::Equipped { weapon, .. } => {
                format!("{} equipped {}", agent_name, weapon)
            }
            Notification::Upgraded { from, to, .. } => {
                format!("{} upgraded from {} to {}", agent_name, from, to)
            }
        }
    }
}
