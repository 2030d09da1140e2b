//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // armory-events = { path = "../armory-events", features = ["test-fixtures"] }
//!
//! use armory_events::fixtures;
//!
//! let weapons = fixtures::sample_weapons();
//! let agent = fixtures::colonist(1, Position::new(0, 0));
//! ```

use crate::{
    AgentId, AgentSnapshot, AgentStatus, OutfitFilter, Position, Quality, Skills, WeaponDefId,
    WeaponId, WeaponKind, WeaponSnapshot, WeaponStats,
};

/// Returns sample weapons from the fixtures file.
///
/// Contains 7 items:
/// - 4 ranged weapons (revolver, assault rifle, sniper rifle, shotgun)
/// - 2 melee weapons (knife, long sword)
/// - 1 tool that is not a proper weapon (pickaxe)
pub fn sample_weapons() -> Vec<WeaponSnapshot> {
    let json = include_str!("../tests/fixtures/sample_weapons.json");
    serde_json::from_str(json).expect("Failed to parse sample_weapons.json")
}

/// Builds a ranged weapon whose stats make `damage` the dominant score factor.
pub fn ranged(id: u64, def: &str, damage: f32, position: Position) -> WeaponSnapshot {
    weapon(id, def, WeaponKind::Ranged, damage, 28.0, position)
}

/// Builds a melee weapon.
pub fn melee(id: u64, def: &str, damage: f32, position: Position) -> WeaponSnapshot {
    weapon(id, def, WeaponKind::Melee, damage, 1.5, position)
}

/// Builds a weapon with neutral secondary stats.
pub fn weapon(
    id: u64,
    def: &str,
    kind: WeaponKind,
    damage: f32,
    range: f32,
    position: Position,
) -> WeaponSnapshot {
    WeaponSnapshot {
        id: WeaponId(id),
        def: WeaponDefId::from(def),
        position: Some(position),
        is_proper_weapon: true,
        forbidden: false,
        condition: 1.0,
        stats: WeaponStats {
            kind,
            damage,
            cooldown: 1.0,
            range,
            accuracy: 1.0,
            armor_penetration: 0.0,
            quality: Quality::Normal,
        },
        ammo_kind: None,
        modified_tick: 0,
    }
}

/// Builds an eligible, unarmed colonist.
pub fn colonist(id: u64, position: Position) -> AgentSnapshot {
    AgentSnapshot {
        id: AgentId(id),
        name: format!("Colonist {}", id),
        position: Some(position),
        primary: None,
        sidearms: Vec::new(),
        status: AgentStatus::default(),
        is_colonist: true,
        is_temporary: false,
        skills: Skills::default(),
        traits: Vec::new(),
        skills_changed_tick: 0,
        outfit: OutfitFilter::AllowAll,
        current_job: None,
        carried_ammo: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_weapons_load() {
        let weapons = sample_weapons();
        assert_eq!(weapons.len(), 7);
        assert_eq!(weapons.iter().filter(|w| w.is_proper_weapon).count(), 6);
        assert!(weapons.iter().all(|w| w.condition == 1.0));
    }

    #[test]
    fn test_builders() {
        let w = ranged(1, "Gun_Test", 10.0, Position::new(1, 1));
        assert!(w.is_spawned_weapon());
        let a = colonist(2, Position::new(0, 0));
        assert!(a.is_unarmed());
        assert!(a.is_colonist);
    }
}
