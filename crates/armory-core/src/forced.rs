//! Forced Override Tracker
//!
//! Remembers weapons a player assigned by hand. Automatic logic must never
//! replace them. Primary weapons are tracked by instance; sidearms are
//! tracked by def so that swapping a forced sidearm for a better copy of
//! the same def keeps it forced.
//!
//! Only the def identities are persisted. After a load the primary record
//! is unbound (no instance) until [`ForcedOverrideTracker::reconcile`]
//! finds the agent still holding a weapon of that def.

use std::collections::{BTreeSet, HashMap};

use armory_events::{AgentId, AgentSnapshot, SaveData, Tick, WeaponDefId, WeaponId};

use crate::host::WorldView;

/// A player-assigned primary weapon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedPrimary {
    /// Bound instance; `None` right after loading a save
    pub weapon: Option<WeaponId>,
    pub def: WeaponDefId,
    pub since: Tick,
}

#[derive(Debug, Default)]
pub struct ForcedOverrideTracker {
    primary: HashMap<AgentId, ForcedPrimary>,
    sidearm_defs: HashMap<AgentId, BTreeSet<WeaponDefId>>,
}

impl ForcedOverrideTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `weapon` as the agent's forced primary, replacing any earlier record.
    pub fn set_forced(&mut self, agent: AgentId, weapon: WeaponId, def: WeaponDefId, now: Tick) {
        tracing::debug!("{} forced to {} ({})", agent, weapon, def);
        self.primary.insert(
            agent,
            ForcedPrimary {
                weapon: Some(weapon),
                def,
                since: now,
            },
        );
    }

    pub fn clear_forced(&mut self, agent: AgentId) -> bool {
        self.primary.remove(&agent).is_some()
    }

    pub fn forced_primary(&self, agent: AgentId) -> Option<&ForcedPrimary> {
        self.primary.get(&agent)
    }

    pub fn has_forced_primary(&self, agent: AgentId) -> bool {
        self.primary.contains_key(&agent)
    }

    /// True when the player assigned this weapon to the agent.
    ///
    /// Matches the bound primary instance, an unbound primary record by def,
    /// or any forced sidearm def.
    pub fn is_forced(&self, agent: AgentId, weapon: WeaponId, def: &WeaponDefId) -> bool {
        let primary = self.primary.get(&agent).is_some_and(|f| match f.weapon {
            Some(bound) => bound == weapon,
            None => &f.def == def,
        });
        primary || self.is_forced_def(agent, def)
    }

    pub fn add_forced_def(&mut self, agent: AgentId, def: WeaponDefId) -> bool {
        self.sidearm_defs.entry(agent).or_default().insert(def)
    }

    pub fn remove_forced_def(&mut self, agent: AgentId, def: &WeaponDefId) -> bool {
        let Some(defs) = self.sidearm_defs.get_mut(&agent) else {
            return false;
        };
        let removed = defs.remove(def);
        if defs.is_empty() {
            self.sidearm_defs.remove(&agent);
        }
        removed
    }

    pub fn is_forced_def(&self, agent: AgentId, def: &WeaponDefId) -> bool {
        self.sidearm_defs
            .get(&agent)
            .is_some_and(|defs| defs.contains(def))
    }

    pub fn forced_defs(&self, agent: AgentId) -> Option<&BTreeSet<WeaponDefId>> {
        self.sidearm_defs.get(&agent)
    }

    /// Clears primary records bound to a destroyed weapon. Returns the affected agents.
    pub fn clear_weapon(&mut self, weapon: WeaponId) -> Vec<AgentId> {
        let agents: Vec<AgentId> = self
            .primary
            .iter()
            .filter(|(_, f)| f.weapon == Some(weapon))
            .map(|(agent, _)| *agent)
            .collect();
        for agent in &agents {
            self.primary.remove(agent);
        }
        agents
    }

    /// Brings the agent's records in line with what it actually carries.
    ///
    /// Binds an unbound primary record to the carried primary of the same
    /// def, and drops records for weapons the agent no longer holds.
    /// Returns the number of records dropped.
    pub fn reconcile(&mut self, agent: &AgentSnapshot, world: &dyn WorldView) -> usize {
        let def_of = |id: WeaponId| world.weapon(id).map(|w| w.def.clone());
        let mut removed = 0;

        if let Some(record) = self.primary.get_mut(&agent.id) {
            let keep = match (record.weapon, agent.primary) {
                (Some(bound), Some(held)) => bound == held,
                (None, Some(held)) => {
                    if def_of(held).as_ref() == Some(&record.def) {
                        record.weapon = Some(held);
                        true
                    } else {
                        false
                    }
                }
                (_, None) => false,
            };
            if !keep {
                tracing::debug!("Clearing forced primary of {}: no longer held", agent.id);
                self.primary.remove(&agent.id);
                removed += 1;
            }
        }

        if let Some(defs) = self.sidearm_defs.get_mut(&agent.id) {
            let carried: BTreeSet<WeaponDefId> =
                agent.carried_weapons().filter_map(def_of).collect();
            let before = defs.len();
            defs.retain(|def| carried.contains(def));
            removed += before - defs.len();
            if defs.is_empty() {
                self.sidearm_defs.remove(&agent.id);
            }
        }

        removed
    }

    /// Drops every record for an agent. Returns the number removed.
    pub fn purge_agent(&mut self, agent: AgentId) -> usize {
        let primary = self.primary.remove(&agent).is_some() as usize;
        let sidearms = self.sidearm_defs.remove(&agent).map_or(0, |d| d.len());
        primary + sidearms
    }

    /// Every agent with any record.
    pub fn agents(&self) -> BTreeSet<AgentId> {
        self.primary
            .keys()
            .chain(self.sidearm_defs.keys())
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.sidearm_defs.values().map(|d| d.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.sidearm_defs.is_empty()
    }

    /// Def identities of every record, for persistence.
    pub fn to_save_data(&self) -> SaveData {
        SaveData {
            forced_primary: self
                .primary
                .iter()
                .map(|(agent, f)| (*agent, f.def.clone()))
                .collect(),
            forced_sidearm_defs: self
                .sidearm_defs
                .iter()
                .map(|(agent, defs)| (*agent, defs.clone()))
                .collect(),
            ..SaveData::default()
        }
    }

    /// Replaces all records with persisted ones. Primary records start unbound.
    pub fn load(&mut self, data: &SaveData, now: Tick) {
        self.primary = data
            .forced_primary
            .iter()
            .map(|(agent, def)| {
                (
                    *agent,
                    ForcedPrimary {
                        weapon: None,
                        def: def.clone(),
                        since: now,
                    },
                )
            })
            .collect();
        self.sidearm_defs = data
            .forced_sidearm_defs
            .iter()
            .filter(|(_, defs)| !defs.is_empty())
            .map(|(agent, defs)| (*agent, defs.clone()))
            .collect();
    }
}
