//! Scoring Oracle
//!
//! Converts an (agent, weapon) pair into a commensurable utility number.
//! The oracle is split in two so the score cache can memoize the
//! weapon-only part separately from the agent-specific part:
//!
//! - `intrinsic_score`: damage output, armor penetration, range, quality, condition
//! - `agent_score`: skill and trait modifiers applied on top of the intrinsic score
//!
//! Situational modifiers (ammunition) are applied by the cache through the
//! capability interfaces in [`crate::capability`], not by the oracle.

use serde::{Deserialize, Serialize};

use armory_events::{AgentSnapshot, CombatTrait, WeaponKind, WeaponSnapshot};

use crate::error::ScoreError;

/// Sentinel score for weapons an agent must never auto-equip.
pub const UNUSABLE_SCORE: f32 = -1_000_000.0;

/// True for any score that is not the unusable sentinel (or below it).
pub fn is_usable(score: f32) -> bool {
    score.is_finite() && score > UNUSABLE_SCORE
}

/// Pluggable scoring function.
///
/// Implementations must be deterministic given their inputs; the cache
/// relies on that to serve repeated lookups without calling back in.
pub trait ScoringOracle {
    /// Weapon-only utility, independent of who wields it.
    fn intrinsic_score(&self, weapon: &WeaponSnapshot) -> Result<f32, ScoreError>;

    /// Utility of `weapon` in the hands of `agent`, given its intrinsic score.
    fn agent_score(
        &self,
        agent: &AgentSnapshot,
        weapon: &WeaponSnapshot,
        intrinsic: f32,
    ) -> Result<f32, ScoreError>;
}

/// Tuning constants for [`StatOracle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleWeights {
    /// Multiplier bonus per point of armor penetration (0..1)
    pub armor_penetration: f32,
    /// Multiplier bonus per cell of range for ranged weapons
    pub range: f32,
    /// Score multiplier of a weapon at zero hit points
    pub condition_floor: f32,
    /// Multiplier change per skill level away from the baseline
    pub skill_per_level: f32,
    /// Skill level that yields a neutral multiplier
    pub skill_baseline: u8,
    pub brawler_melee: f32,
    pub brawler_ranged: f32,
    pub trigger_happy: f32,
    pub careful_shooter: f32,
}

impl Default for OracleWeights {
    fn default() -> Self {
        Self {
            armor_penetration: 1.0,
            range: 0.01,
            condition_floor: 0.5,
            skill_per_level: 0.05,
            skill_baseline: 5,
            brawler_melee: 1.5,
            brawler_ranged: 0.2,
            trigger_happy: 1.05,
            careful_shooter: 1.1,
        }
    }
}

/// Default stat-driven oracle.
#[derive(Debug, Clone, Default)]
pub struct StatOracle {
    weights: OracleWeights,
}

impl StatOracle {
    pub fn new(weights: OracleWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &OracleWeights {
        &self.weights
    }

    fn skill_multiplier(&self, level: u8) -> f32 {
        let delta = level as f32 - self.weights.skill_baseline as f32;
        (1.0 + delta * self.weights.skill_per_level).max(0.1)
    }

    fn trait_multiplier(&self, agent: &AgentSnapshot, weapon: &WeaponSnapshot) -> f32 {
        let mut multiplier = 1.0;
        match weapon.stats.kind {
            WeaponKind::Melee => {
                if agent.has_trait(CombatTrait::Brawler) {
                    multiplier *= self.weights.brawler_melee;
                }
            }
            WeaponKind::Ranged => {
                if agent.has_trait(CombatTrait::Brawler) {
                    multiplier *= self.weights.brawler_ranged;
                }
                if agent.has_trait(CombatTrait::TriggerHappy) {
                    multiplier *= self.weights.trigger_happy;
                }
                if agent.has_trait(CombatTrait::CarefulShooter) {
                    multiplier *= self.weights.careful_shooter;
                }
            }
        }
        multiplier
    }
}

impl ScoringOracle for StatOracle {
    fn intrinsic_score(&self, weapon: &WeaponSnapshot) -> Result<f32, ScoreError> {
        let stats = &weapon.stats;
        if stats.cooldown.is_nan() || stats.cooldown <= 0.0 {
            return Err(ScoreError::InvalidStat {
                def: weapon.def.clone(),
                stat: "cooldown",
                value: stats.cooldown,
            });
        }
        if stats.damage.is_nan() || stats.damage < 0.0 {
            return Err(ScoreError::InvalidStat {
                def: weapon.def.clone(),
                stat: "damage",
                value: stats.damage,
            });
        }

        let dps = stats.damage / stats.cooldown * stats.accuracy.clamp(0.0, 1.0);
        let penetration = 1.0 + stats.armor_penetration.clamp(0.0, 1.0) * self.weights.armor_penetration;
        let reach = match stats.kind {
            WeaponKind::Melee => 1.0,
            WeaponKind::Ranged => 1.0 + stats.range.max(0.0) * self.weights.range,
        };
        let floor = self.weights.condition_floor;
        let condition = floor + (1.0 - floor) * weapon.condition.clamp(0.0, 1.0);

        let score = dps * penetration * reach * stats.quality.multiplier() * condition;
        if !score.is_finite() {
            return Err(ScoreError::NonFinite(weapon.def.clone()));
        }
        Ok(score)
    }

    fn agent_score(
        &self,
        agent: &AgentSnapshot,
        weapon: &WeaponSnapshot,
        intrinsic: f32,
    ) -> Result<f32, ScoreError> {
        let skill = match weapon.stats.kind {
            WeaponKind::Melee => agent.skills.melee,
            WeaponKind::Ranged => agent.skills.shooting,
        };
        let score = intrinsic * self.skill_multiplier(skill) * self.trait_multiplier(agent, weapon);
        if !score.is_finite() {
            return Err(ScoreError::NonFinite(weapon.def.clone()));
        }
        Ok(score)
    }
}
