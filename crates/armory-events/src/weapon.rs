//! Weapon Snapshots
//!
//! Read-only view of a weapon instance as exposed by the host simulation.

use serde::{Deserialize, Serialize};

use crate::geometry::Position;
use crate::ids::{Tick, WeaponDefId, WeaponId};

/// Broad weapon kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Melee,
    Ranged,
}

/// Item quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Awful,
    Poor,
    #[default]
    Normal,
    Good,
    Excellent,
    Masterwork,
    Legendary,
}

impl Quality {
    /// Multiplier applied to intrinsic weapon stats.
    pub fn multiplier(self) -> f32 {
        match self {
            Quality::Awful => 0.8,
            Quality::Poor => 0.9,
            Quality::Normal => 1.0,
            Quality::Good => 1.1,
            Quality::Excellent => 1.2,
            Quality::Masterwork => 1.35,
            Quality::Legendary => 1.5,
        }
    }
}

/// Intrinsic combat stats of a weapon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponStats {
    pub kind: WeaponKind,
    /// Damage per hit
    pub damage: f32,
    /// Seconds between attacks
    pub cooldown: f32,
    /// Maximum range in cells (melee weapons use their reach)
    pub range: f32,
    /// Hit chance at medium range, 0..1
    pub accuracy: f32,
    /// Armor penetration, 0..1
    pub armor_penetration: f32,
    pub quality: Quality,
}

impl WeaponStats {
    /// True when every numeric stat is finite.
    pub fn is_finite(&self) -> bool {
        [
            self.damage,
            self.cooldown,
            self.range,
            self.accuracy,
            self.armor_penetration,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Coarse weapon category used by the category buckets of the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponCategory {
    Melee,
    RangedShort,
    RangedMedium,
    RangedLong,
}

impl WeaponCategory {
    pub fn all() -> &'static [WeaponCategory] {
        &[
            WeaponCategory::Melee,
            WeaponCategory::RangedShort,
            WeaponCategory::RangedMedium,
            WeaponCategory::RangedLong,
        ]
    }

    pub fn ranged() -> &'static [WeaponCategory] {
        &[
            WeaponCategory::RangedShort,
            WeaponCategory::RangedMedium,
            WeaponCategory::RangedLong,
        ]
    }

    pub fn is_melee(self) -> bool {
        matches!(self, WeaponCategory::Melee)
    }

    /// Classifies weapon stats into a category using the given range bands.
    pub fn classify(stats: &WeaponStats, bands: &RangeBands) -> Self {
        match stats.kind {
            WeaponKind::Melee => WeaponCategory::Melee,
            WeaponKind::Ranged if stats.range < bands.short_max => WeaponCategory::RangedShort,
            WeaponKind::Ranged if stats.range < bands.medium_max => WeaponCategory::RangedMedium,
            WeaponKind::Ranged => WeaponCategory::RangedLong,
        }
    }
}

/// Range thresholds separating short, medium and long ranged weapons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeBands {
    /// Ranged weapons below this range are short range
    pub short_max: f32,
    /// Ranged weapons below this range (and not short) are medium range
    pub medium_max: f32,
}

impl Default for RangeBands {
    fn default() -> Self {
        Self {
            short_max: 16.0,
            medium_max: 30.0,
        }
    }
}

/// A weapon instance as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponSnapshot {
    pub id: WeaponId,
    pub def: WeaponDefId,
    /// Position on the map, `None` while carried or otherwise not spawned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Whether the host considers this a proper weapon (not a tool, grenade, shield...)
    pub is_proper_weapon: bool,
    /// Forbidden by the player
    #[serde(default)]
    pub forbidden: bool,
    /// Remaining hit points as a fraction, 0..1
    #[serde(default = "full_condition")]
    pub condition: f32,
    pub stats: WeaponStats,
    /// Ammunition kind consumed by this weapon, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ammo_kind: Option<String>,
    /// Tick of the last mutation of this weapon (quality, hit points, biocoding...)
    #[serde(default)]
    pub modified_tick: Tick,
}

fn full_condition() -> f32 {
    1.0
}

impl WeaponSnapshot {
    /// True when the weapon is a proper weapon lying on the map.
    pub fn is_spawned_weapon(&self) -> bool {
        self.is_proper_weapon && self.position.is_some()
    }

    pub fn category(&self, bands: &RangeBands) -> WeaponCategory {
        WeaponCategory::classify(&self.stats, bands)
    }
}
