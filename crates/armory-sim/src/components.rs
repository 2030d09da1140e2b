//! Harness Components
//!
//! The ECS world is the stand-in host: colonists and weapons are entities
//! carrying the snapshot the engine will see, plus the bookkeeping the
//! harness needs to walk colonists over to their targets.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

use armory_core::MemoryWorld;
use armory_events::{AgentId, AgentSnapshot, EquipJob, Tick, WeaponId, WeaponSnapshot, WorldEvent};

/// A colonist and everything the engine may know about it
#[derive(Component, Debug, Clone)]
pub struct Colonist(pub AgentSnapshot);

/// A weapon, on the ground or carried
#[derive(Component, Debug, Clone)]
pub struct Weapon(pub WeaponSnapshot);

/// An engine job being walked out by a colonist
#[derive(Component, Debug, Clone)]
pub struct Errand {
    pub job: EquipJob,
    pub arrives_at: Tick,
}

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

/// Current harness tick
#[derive(Resource, Debug, Default)]
pub struct SimClock {
    pub tick: Tick,
}

/// Tunables of the stand-in host
#[derive(Resource, Debug, Clone)]
pub struct HostSettings {
    pub map_size: i32,
    /// Cells walked per tick
    pub walk_speed: f32,
    /// Chance that an errand fails on arrival
    pub failure_chance: f32,
    /// Ticks between loot drops
    pub loot_interval: u64,
    /// Ticks between weapon wear passes
    pub wear_interval: u64,
    /// Ticks between colonists switching activity
    pub activity_interval: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            map_size: 120,
            walk_speed: 2.0,
            failure_chance: 0.1,
            loot_interval: 150,
            wear_interval: 200,
            activity_interval: 50,
        }
    }
}

/// Entity lookup by engine-facing id
#[derive(Resource, Debug, Default)]
pub struct EntityIndex {
    pub agents: HashMap<AgentId, Entity>,
    pub weapons: HashMap<WeaponId, Entity>,
    pub next_weapon_id: u64,
    pub next_activity_job: u64,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self {
            next_weapon_id: 1,
            // Host activity ids live far above the engine's job ids
            next_activity_job: 1_000_000,
            ..Default::default()
        }
    }

    pub fn allocate_weapon_id(&mut self) -> WeaponId {
        let id = WeaponId(self.next_weapon_id);
        self.next_weapon_id += 1;
        id
    }
}

/// World events raised this tick, waiting to be handed to the engine
#[derive(Resource, Debug, Default)]
pub struct Outbox(pub Vec<WorldEvent>);

/// Plain-data copy of the ECS world the engine reads through `WorldView`
#[derive(Resource, Debug, Default)]
pub struct Mirror(pub MemoryWorld);
