//! Agent Snapshots
//!
//! Read-only view of a simulated agent (pawn) as exposed by the host.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::geometry::Position;
use crate::ids::{AgentId, JobId, Tick, WeaponDefId, WeaponId};

/// Health and control state flags that gate weapon evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub alive: bool,
    /// Downed agents are not conscious enough to act
    pub downed: bool,
    pub drafted: bool,
    /// Imprisoned, arrested or otherwise restrained
    pub restrained: bool,
    pub violence_capable: bool,
    /// Mental break or other state where the agent is not under normal control
    #[serde(default)]
    pub in_mental_state: bool,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self {
            alive: true,
            downed: false,
            drafted: false,
            restrained: false,
            violence_capable: true,
            in_mental_state: false,
        }
    }
}

/// Combat-relevant skills, 0..20.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Skills {
    pub shooting: u8,
    pub melee: u8,
}

impl Default for Skills {
    fn default() -> Self {
        Self {
            shooting: 5,
            melee: 5,
        }
    }
}

/// Traits that change how an agent values weapons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatTrait {
    /// Prefers melee, penalized with ranged weapons
    Brawler,
    /// Fires faster and less accurately
    TriggerHappy,
    /// Aims longer and more accurately
    CarefulShooter,
}

/// Outfit policy restricting which weapon defs an agent may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "defs", rename_all = "snake_case")]
pub enum OutfitFilter {
    #[default]
    AllowAll,
    AllowOnly(BTreeSet<WeaponDefId>),
    Deny(BTreeSet<WeaponDefId>),
}

impl OutfitFilter {
    pub fn allows(&self, def: &WeaponDefId) -> bool {
        match self {
            OutfitFilter::AllowAll => true,
            OutfitFilter::AllowOnly(defs) => defs.contains(def),
            OutfitFilter::Deny(defs) => !defs.contains(def),
        }
    }
}

/// The activity an agent is currently performing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentJob {
    pub job_id: JobId,
    /// Job class name, classified by the interruption table
    pub class: String,
}

impl CurrentJob {
    pub fn new(job_id: JobId, class: impl Into<String>) -> Self {
        Self {
            job_id,
            class: class.into(),
        }
    }
}

/// An agent as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    /// Position on the map, `None` when not spawned (caravan, transport pod...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Currently equipped primary weapon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<WeaponId>,
    /// Weapons carried in inventory as sidearms
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidearms: Vec<WeaponId>,
    #[serde(default)]
    pub status: AgentStatus,
    /// Member of the player's colony
    pub is_colonist: bool,
    /// Temporary member (quest lodger, borrowed pawn)
    #[serde(default)]
    pub is_temporary: bool,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<CombatTrait>,
    /// Tick of the last skill or trait change
    #[serde(default)]
    pub skills_changed_tick: Tick,
    #[serde(default)]
    pub outfit: OutfitFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job: Option<CurrentJob>,
    /// Ammunition carried, by ammo kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub carried_ammo: BTreeMap<String, u32>,
}

impl AgentSnapshot {
    pub fn has_trait(&self, t: CombatTrait) -> bool {
        self.traits.contains(&t)
    }

    pub fn is_unarmed(&self) -> bool {
        self.primary.is_none()
    }

    /// True when the agent carries the weapon as primary or sidearm.
    pub fn carries(&self, weapon: WeaponId) -> bool {
        self.primary == Some(weapon) || self.sidearms.contains(&weapon)
    }

    /// Every weapon carried, primary first.
    pub fn carried_weapons(&self) -> impl Iterator<Item = WeaponId> + '_ {
        self.primary.into_iter().chain(self.sidearms.iter().copied())
    }
}
