//! Inbound World Events
//!
//! Mutations reported by the host simulation. Every event maps to an index,
//! cache, tracker or schedule update inside the engine.

use serde::{Deserialize, Serialize};

use crate::geometry::Position;
use crate::ids::{AgentId, JobId, WeaponId};
use crate::job::{EquipSlot, JobOutcome};
use crate::weapon::WeaponSnapshot;

/// How an agent's equipment changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentChange {
    Equipped,
    Dropped,
}

/// A mutation of the host world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    /// A weapon appeared on the map (spawned, dropped, unloaded)
    WeaponSpawned { weapon: WeaponSnapshot },
    /// A weapon was destroyed or despawned for good
    WeaponDestroyed { weapon: WeaponId },
    /// A weapon changed position; `to` is `None` when it left the map
    WeaponMoved {
        weapon: WeaponId,
        from: Position,
        to: Option<Position>,
    },
    /// Quality, hit points or other intrinsic stats of a weapon changed
    WeaponModified { weapon: WeaponId },
    /// An agent equipped or dropped a weapon
    EquipmentChanged {
        agent: AgentId,
        weapon: WeaponId,
        change: EquipmentChange,
        slot: EquipSlot,
        /// Job that caused the change, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job: Option<JobId>,
        /// Whether the host attributes the change to a direct player order
        player_forced: bool,
    },
    /// The agent's outfit policy changed
    OutfitChanged { agent: AgentId },
    /// The agent's skills or traits changed
    SkillsChanged { agent: AgentId },
    /// The agent died, left the map for good or was otherwise destroyed
    AgentDestroyed { agent: AgentId },
    /// A job issued by the engine finished
    JobEnded { job: JobId, outcome: JobOutcome },
}

impl WorldEvent {
    /// Short name used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            WorldEvent::WeaponSpawned { .. } => "weapon_spawned",
            WorldEvent::WeaponDestroyed { .. } => "weapon_destroyed",
            WorldEvent::WeaponMoved { .. } => "weapon_moved",
            WorldEvent::WeaponModified { .. } => "weapon_modified",
            WorldEvent::EquipmentChanged { .. } => "equipment_changed",
            WorldEvent::OutfitChanged { .. } => "outfit_changed",
            WorldEvent::SkillsChanged { .. } => "skills_changed",
            WorldEvent::AgentDestroyed { .. } => "agent_destroyed",
            WorldEvent::JobEnded { .. } => "job_ended",
        }
    }
}
