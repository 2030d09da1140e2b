//! Host World Interface
//!
//! The engine never owns agents or weapons. It reads them through
//! [`WorldView`], which is also the authoritative liveness check used by
//! maintenance sweeps: an id the world can no longer resolve is dead.

use std::collections::HashMap;

use armory_events::{AgentId, AgentSnapshot, Tick, WeaponId, WeaponSnapshot};

/// Read-only access to the host simulation.
pub trait WorldView {
    fn current_tick(&self) -> Tick;

    /// Looks up a weapon; `None` once destroyed.
    fn weapon(&self, id: WeaponId) -> Option<&WeaponSnapshot>;

    /// Looks up an agent; `None` once destroyed.
    fn agent(&self, id: AgentId) -> Option<&AgentSnapshot>;

    /// Primary enumeration of weapons on the map, from the host's own item index.
    fn enumerate_weapons(&self) -> Vec<WeaponId>;

    /// Exhaustive enumeration of every item on the map, weapons or not.
    ///
    /// Slow; only used when [`WorldView::enumerate_weapons`] looks broken.
    fn enumerate_all_items(&self) -> Vec<WeaponId>;

    /// Every agent the engine may evaluate.
    fn agent_ids(&self) -> Vec<AgentId>;

    /// Number of colonists, used to scale evaluation cost.
    fn colonist_count(&self) -> usize;

    /// Whether the host runs an ammunition system.
    fn supports_ammo(&self) -> bool {
        false
    }
}

/// In-memory world backed by hash maps.
///
/// Used by tests and the headless harness. The weapon enumeration can be
/// switched off to simulate a broken host item index.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    pub tick: Tick,
    pub weapons: HashMap<WeaponId, WeaponSnapshot>,
    pub agents: HashMap<AgentId, AgentSnapshot>,
    /// When false, `enumerate_weapons` returns nothing
    pub weapon_enumeration_works: bool,
    pub ammo_system: bool,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self {
            weapon_enumeration_works: true,
            ..Default::default()
        }
    }

    pub fn insert_weapon(&mut self, weapon: WeaponSnapshot) {
        self.weapons.insert(weapon.id, weapon);
    }

    pub fn insert_agent(&mut self, agent: AgentSnapshot) {
        self.agents.insert(agent.id, agent);
    }

    pub fn weapon_mut(&mut self, id: WeaponId) -> Option<&mut WeaponSnapshot> {
        self.weapons.get_mut(&id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut AgentSnapshot> {
        self.agents.get_mut(&id)
    }

    pub fn remove_weapon(&mut self, id: WeaponId) -> Option<WeaponSnapshot> {
        self.weapons.remove(&id)
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Option<AgentSnapshot> {
        self.agents.remove(&id)
    }
}

impl WorldView for MemoryWorld {
    fn current_tick(&self) -> Tick {
        self.tick
    }

    fn weapon(&self, id: WeaponId) -> Option<&WeaponSnapshot> {
        self.weapons.get(&id)
    }

    fn agent(&self, id: AgentId) -> Option<&AgentSnapshot> {
        self.agents.get(&id)
    }

    fn enumerate_weapons(&self) -> Vec<WeaponId> {
        if !self.weapon_enumeration_works {
            return Vec::new();
        }
        let mut ids: Vec<WeaponId> = self
            .weapons
            .values()
            .filter(|w| w.is_spawned_weapon())
            .map(|w| w.id)
            .collect();
        ids.sort();
        ids
    }

    fn enumerate_all_items(&self) -> Vec<WeaponId> {
        let mut ids: Vec<WeaponId> = self.weapons.keys().copied().collect();
        ids.sort();
        ids
    }

    fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.keys().copied().collect();
        ids.sort();
        ids
    }

    fn colonist_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_colonist).count()
    }

    fn supports_ammo(&self) -> bool {
        self.ammo_system
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armory_events::{fixtures, Position};

    #[test]
    fn test_enumeration_skips_carried_and_non_weapons() {
        let mut world = MemoryWorld::new();
        for w in fixtures::sample_weapons() {
            world.insert_weapon(w);
        }
        let mut carried = fixtures::ranged(200, "Gun_Carried", 10.0, Position::new(0, 0));
        carried.position = None;
        world.insert_weapon(carried);

        assert_eq!(world.enumerate_weapons().len(), 6);
        assert_eq!(world.enumerate_all_items().len(), 8);
    }

    #[test]
    fn test_broken_enumeration() {
        let mut world = MemoryWorld::new();
        world.insert_weapon(fixtures::ranged(1, "Gun_A", 10.0, Position::new(0, 0)));
        world.weapon_enumeration_works = false;
        assert!(world.enumerate_weapons().is_empty());
        assert_eq!(world.enumerate_all_items(), vec![WeaponId(1)]);
    }
}
