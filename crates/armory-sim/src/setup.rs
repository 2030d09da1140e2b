//! Colony Setup
//!
//! Spawns colonists and a scatter of weapons. One colonist starts with a
//! revolver the player handed over, which the engine must leave alone.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use armory_events::{
    AgentId, AgentSnapshot, AgentStatus, CombatTrait, EquipSlot, EquipmentChange, OutfitFilter,
    Position, Quality, Skills, WeaponDefId, WeaponKind, WeaponSnapshot, WeaponStats, WorldEvent,
};

use crate::components::{Colonist, EntityIndex, Outbox, Weapon};

/// A weapon def the harness can drop.
pub struct CatalogEntry {
    pub def: &'static str,
    pub kind: WeaponKind,
    pub damage: f32,
    pub cooldown: f32,
    pub range: f32,
    pub accuracy: f32,
    pub armor_penetration: f32,
    pub ammo: Option<&'static str>,
}

#[allow(clippy::too_many_arguments)]
const fn entry(
    def: &'static str,
    kind: WeaponKind,
    damage: f32,
    cooldown: f32,
    range: f32,
    accuracy: f32,
    armor_penetration: f32,
    ammo: Option<&'static str>,
) -> CatalogEntry {
    CatalogEntry {
        def,
        kind,
        damage,
        cooldown,
        range,
        accuracy,
        armor_penetration,
        ammo,
    }
}

pub const CATALOG: &[CatalogEntry] = &[
    entry("Gun_Revolver", WeaponKind::Ranged, 12.0, 1.6, 25.9, 0.7, 0.18, Some("pistol_rounds")),
    entry("Gun_AutoPistol", WeaponKind::Ranged, 10.0, 1.0, 24.9, 0.65, 0.15, Some("pistol_rounds")),
    entry("Gun_AssaultRifle", WeaponKind::Ranged, 11.0, 0.55, 30.9, 0.75, 0.16, Some("rifle_rounds")),
    entry("Gun_SniperRifle", WeaponKind::Ranged, 25.0, 2.8, 44.9, 0.9, 0.38, Some("rifle_rounds")),
    entry("Gun_PumpShotgun", WeaponKind::Ranged, 18.0, 1.3, 15.9, 0.8, 0.14, Some("shells")),
    entry("MeleeWeapon_Knife", WeaponKind::Melee, 9.0, 1.3, 1.5, 1.0, 0.13, None),
    entry("MeleeWeapon_Mace", WeaponKind::Melee, 15.0, 2.0, 1.5, 1.0, 0.2, None),
    entry("MeleeWeapon_LongSword", WeaponKind::Melee, 19.0, 1.9, 1.5, 1.0, 0.25, None),
];

const QUALITIES: [Quality; 7] = [
    Quality::Awful,
    Quality::Poor,
    Quality::Normal,
    Quality::Good,
    Quality::Excellent,
    Quality::Masterwork,
    Quality::Legendary,
];

const AMMO_KINDS: [&str; 3] = ["pistol_rounds", "rifle_rounds", "shells"];

const NAMES: [&str; 12] = [
    "Mira", "Tomas", "Ilse", "Dov", "Ren", "Kasia", "Obi", "Lena", "Ansel", "Yara", "Piet",
    "Suri",
];

fn random_position(rng: &mut SmallRng, map_size: i32) -> Position {
    Position::new(rng.gen_range(0..map_size), rng.gen_range(0..map_size))
}

/// Rolls a weapon from the catalog.
pub fn roll_weapon(rng: &mut SmallRng, index: &mut EntityIndex, position: Option<Position>) -> WeaponSnapshot {
    let entry = &CATALOG[rng.gen_range(0..CATALOG.len())];
    // Weighted towards the middle tiers
    let quality = QUALITIES[(rng.gen_range(0..4) + rng.gen_range(0..4)).min(6)];
    WeaponSnapshot {
        id: index.allocate_weapon_id(),
        def: WeaponDefId::from(entry.def),
        position,
        is_proper_weapon: true,
        forbidden: rng.gen_bool(0.05),
        condition: rng.gen_range(0.4..=1.0),
        stats: WeaponStats {
            kind: entry.kind,
            damage: entry.damage,
            cooldown: entry.cooldown,
            range: entry.range,
            accuracy: entry.accuracy,
            armor_penetration: entry.armor_penetration,
            quality,
        },
        ammo_kind: entry.ammo.map(str::to_string),
        modified_tick: 0,
    }
}

fn roll_colonist(rng: &mut SmallRng, id: u64, map_size: i32) -> AgentSnapshot {
    let mut traits = Vec::new();
    for t in [
        CombatTrait::Brawler,
        CombatTrait::TriggerHappy,
        CombatTrait::CarefulShooter,
    ] {
        if rng.gen_bool(0.15) {
            traits.push(t);
        }
    }
    let ammo = AMMO_KINDS[rng.gen_range(0..AMMO_KINDS.len())];
    AgentSnapshot {
        id: AgentId(id),
        name: NAMES[(id as usize - 1) % NAMES.len()].to_string(),
        position: Some(random_position(rng, map_size)),
        primary: None,
        sidearms: Vec::new(),
        status: AgentStatus::default(),
        is_colonist: true,
        is_temporary: false,
        skills: Skills {
            shooting: rng.gen_range(0..=20),
            melee: rng.gen_range(0..=20),
        },
        traits,
        skills_changed_tick: 0,
        outfit: OutfitFilter::AllowAll,
        current_job: None,
        carried_ammo: [(ammo.to_string(), rng.gen_range(0..60))].into_iter().collect(),
    }
}

/// Spawns `count` colonists at random positions.
pub fn spawn_colonists(world: &mut World, rng: &mut SmallRng, count: usize, map_size: i32) {
    for n in 0..count {
        let agent = roll_colonist(rng, n as u64 + 1, map_size);
        let id = agent.id;
        let entity = world.spawn(Colonist(agent)).id();
        world.resource_mut::<EntityIndex>().agents.insert(id, entity);
    }
}

/// Scatters `count` weapons over the map.
pub fn spawn_weapons(world: &mut World, rng: &mut SmallRng, count: usize, map_size: i32) {
    for _ in 0..count {
        let position = random_position(rng, map_size);
        let weapon = roll_weapon(rng, &mut world.resource_mut::<EntityIndex>(), Some(position));
        let id = weapon.id;
        let entity = world.spawn(Weapon(weapon)).id();
        world.resource_mut::<EntityIndex>().weapons.insert(id, entity);
    }
}

/// Hands the first colonist a revolver by direct player order.
pub fn arm_first_colonist(world: &mut World) {
    let Some(&colonist) = world.resource::<EntityIndex>().agents.get(&AgentId(1)) else {
        return;
    };
    let revolver = {
        let mut index = world.resource_mut::<EntityIndex>();
        let entry = &CATALOG[0];
        WeaponSnapshot {
            id: index.allocate_weapon_id(),
            def: WeaponDefId::from(entry.def),
            position: None,
            is_proper_weapon: true,
            forbidden: false,
            condition: 1.0,
            stats: WeaponStats {
                kind: entry.kind,
                damage: entry.damage,
                cooldown: entry.cooldown,
                range: entry.range,
                accuracy: entry.accuracy,
                armor_penetration: entry.armor_penetration,
                quality: Quality::Poor,
            },
            ammo_kind: entry.ammo.map(str::to_string),
            modified_tick: 0,
        }
    };
    let weapon_id = revolver.id;
    let weapon_entity = world.spawn(Weapon(revolver)).id();
    world
        .resource_mut::<EntityIndex>()
        .weapons
        .insert(weapon_id, weapon_entity);

    if let Some(mut c) = world.get_mut::<Colonist>(colonist) {
        c.0.primary = Some(weapon_id);
    }
    world.resource_mut::<Outbox>().0.push(WorldEvent::EquipmentChanged {
        agent: AgentId(1),
        weapon: weapon_id,
        change: EquipmentChange::Equipped,
        slot: EquipSlot::Primary,
        job: None,
        player_forced: true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_roll_weapon_uses_catalog() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut index = EntityIndex::new();
        let a = roll_weapon(&mut rng, &mut index, Some(Position::new(1, 1)));
        let b = roll_weapon(&mut rng, &mut index, None);
        assert_ne!(a.id, b.id);
        assert!(CATALOG.iter().any(|e| e.def == a.def.as_str()));
        assert!(a.is_spawned_weapon());
        assert!(!b.is_spawned_weapon());
    }

    #[test]
    fn test_spawn_registers_entities() {
        let mut world = World::new();
        world.insert_resource(EntityIndex::new());
        world.insert_resource(Outbox::default());
        let mut rng = SmallRng::seed_from_u64(1);

        spawn_colonists(&mut world, &mut rng, 3, 50);
        spawn_weapons(&mut world, &mut rng, 5, 50);
        arm_first_colonist(&mut world);

        let index = world.resource::<EntityIndex>();
        assert_eq!(index.agents.len(), 3);
        assert_eq!(index.weapons.len(), 6);
        assert_eq!(world.resource::<Outbox>().0.len(), 1);
    }
}
