//! Score Cache
//!
//! Memoizes oracle results in two tiers:
//!
//! - intrinsic scores per weapon
//! - final scores per (agent, weapon) pair, with situational modifiers applied
//!
//! Invalidation is lazy. Instead of walking the pair map when a weapon or
//! agent changes, the cache bumps a generation counter and stamps the
//! subject's clock with it; an entry computed at an older generation than
//! its subjects' clocks is stale on the next lookup. Entries also carry
//! the host's own modification stamps and expire after a TTL, so a missed
//! event can only delay a refresh, never pin a wrong score forever.

use std::collections::HashMap;

use armory_events::{AgentId, AgentSnapshot, Tick, WeaponId, WeaponSnapshot};

use crate::capability::{AmmoStatus, Capabilities};
use crate::config::{CacheConfig, ScoringConfig};
use crate::oracle::{ScoringOracle, UNUSABLE_SCORE};

#[derive(Debug, Clone, Copy)]
struct IntrinsicEntry {
    score: f32,
    generation: u64,
    weapon_stamp: Tick,
    computed_at: Tick,
}

#[derive(Debug, Clone, Copy)]
struct PairEntry {
    score: f32,
    generation: u64,
    weapon_stamp: Tick,
    agent_stamp: Tick,
    computed_at: Tick,
}

/// Lookup counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub intrinsic_hits: u64,
    pub intrinsic_misses: u64,
    /// Oracle or capability faults; the pair scored as unusable
    pub faults: u64,
    /// Results computed but not stored because the cache was full
    pub not_stored: u64,
}

/// Two-tier memo of oracle scores.
#[derive(Debug)]
pub struct ScoreCache {
    ttl_ticks: u64,
    max_entries: usize,
    missing_ammo_factor: f32,
    generation: u64,
    weapon_clock: HashMap<WeaponId, u64>,
    agent_clock: HashMap<AgentId, u64>,
    intrinsic: HashMap<WeaponId, IntrinsicEntry>,
    pairs: HashMap<(AgentId, WeaponId), PairEntry>,
    stats: CacheStats,
}

impl ScoreCache {
    pub fn new(config: &CacheConfig, scoring: &ScoringConfig) -> Self {
        Self {
            ttl_ticks: config.ttl_ticks,
            max_entries: config.max_entries,
            missing_ammo_factor: scoring.missing_ammo_factor,
            generation: 0,
            weapon_clock: HashMap::new(),
            agent_clock: HashMap::new(),
            intrinsic: HashMap::new(),
            pairs: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Number of stored entries across both tiers.
    pub fn len(&self) -> usize {
        self.intrinsic.len() + self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intrinsic.is_empty() && self.pairs.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn expired(&self, computed_at: Tick, now: Tick) -> bool {
        now < computed_at || now - computed_at >= self.ttl_ticks
    }

    fn weapon_clock(&self, id: WeaponId) -> u64 {
        self.weapon_clock.get(&id).copied().unwrap_or(0)
    }

    fn agent_clock(&self, id: AgentId) -> u64 {
        self.agent_clock.get(&id).copied().unwrap_or(0)
    }

    /// Score of `weapon` for `agent`.
    ///
    /// Weapons the agent's outfit disallows score [`UNUSABLE_SCORE`] and are
    /// never cached. An oracle fault also yields [`UNUSABLE_SCORE`] and is
    /// logged rather than propagated.
    pub fn score(
        &mut self,
        agent: &AgentSnapshot,
        weapon: &WeaponSnapshot,
        oracle: &dyn ScoringOracle,
        capabilities: &Capabilities,
        now: Tick,
    ) -> f32 {
        if !agent.outfit.allows(&weapon.def) {
            return UNUSABLE_SCORE;
        }

        let key = (agent.id, weapon.id);
        if let Some(entry) = self.pairs.get(&key).copied() {
            let fresh = entry.weapon_stamp == weapon.modified_tick
                && entry.agent_stamp == agent.skills_changed_tick
                && entry.generation >= self.weapon_clock(weapon.id)
                && entry.generation >= self.agent_clock(agent.id)
                && !self.expired(entry.computed_at, now);
            if fresh {
                self.stats.hits += 1;
                return entry.score;
            }
        }
        self.stats.misses += 1;

        let Some(intrinsic) = self.intrinsic_score(weapon, oracle, now) else {
            return UNUSABLE_SCORE;
        };

        let mut score = match oracle.agent_score(agent, weapon, intrinsic) {
            Ok(score) => score,
            Err(e) => {
                self.stats.faults += 1;
                tracing::warn!("Scoring {} for {} failed: {}", weapon.def, agent.id, e);
                return UNUSABLE_SCORE;
            }
        };

        match capabilities.ammo.ammo_status(agent, weapon) {
            Ok(AmmoStatus::Missing) => score *= self.missing_ammo_factor,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    "Ammo capability '{}' failed for {}: {}",
                    capabilities.ammo.name(),
                    weapon.def,
                    e
                );
            }
        }

        self.store(
            key,
            PairEntry {
                score,
                generation: self.generation,
                weapon_stamp: weapon.modified_tick,
                agent_stamp: agent.skills_changed_tick,
                computed_at: now,
            },
        );
        score
    }

    fn intrinsic_score(
        &mut self,
        weapon: &WeaponSnapshot,
        oracle: &dyn ScoringOracle,
        now: Tick,
    ) -> Option<f32> {
        if let Some(entry) = self.intrinsic.get(&weapon.id).copied() {
            let fresh = entry.weapon_stamp == weapon.modified_tick
                && entry.generation >= self.weapon_clock(weapon.id)
                && !self.expired(entry.computed_at, now);
            if fresh {
                self.stats.intrinsic_hits += 1;
                return Some(entry.score);
            }
        }
        self.stats.intrinsic_misses += 1;

        match oracle.intrinsic_score(weapon) {
            Ok(score) => {
                if self.intrinsic.contains_key(&weapon.id) || self.len() < self.max_entries {
                    self.intrinsic.insert(
                        weapon.id,
                        IntrinsicEntry {
                            score,
                            generation: self.generation,
                            weapon_stamp: weapon.modified_tick,
                            computed_at: now,
                        },
                    );
                } else {
                    self.stats.not_stored += 1;
                }
                Some(score)
            }
            Err(e) => {
                self.stats.faults += 1;
                tracing::warn!("Intrinsic score of {} ({}) failed: {}", weapon.def, weapon.id, e);
                None
            }
        }
    }

    fn store(&mut self, key: (AgentId, WeaponId), entry: PairEntry) {
        if self.pairs.contains_key(&key) || self.len() < self.max_entries {
            self.pairs.insert(key, entry);
        } else {
            self.stats.not_stored += 1;
        }
    }

    /// Marks every score involving `weapon` as stale.
    pub fn invalidate_weapon(&mut self, weapon: WeaponId) {
        self.generation += 1;
        self.weapon_clock.insert(weapon, self.generation);
    }

    /// Marks every score involving `agent` as stale.
    pub fn invalidate_agent(&mut self, agent: AgentId) {
        self.generation += 1;
        self.agent_clock.insert(agent, self.generation);
    }

    /// Drops all entries for a weapon that no longer exists. Returns the number removed.
    pub fn purge_weapon(&mut self, weapon: WeaponId) -> usize {
        let before = self.len();
        self.intrinsic.remove(&weapon);
        self.pairs.retain(|(_, w), _| *w != weapon);
        self.weapon_clock.remove(&weapon);
        before - self.len()
    }

    /// Drops all entries for an agent that no longer exists. Returns the number removed.
    pub fn purge_agent(&mut self, agent: AgentId) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|(a, _), _| *a != agent);
        self.agent_clock.remove(&agent);
        before - self.pairs.len()
    }

    /// Drops entries of weapons failing `live`. Returns the number removed.
    pub fn retain_weapons(&mut self, live: impl Fn(WeaponId) -> bool) -> usize {
        let before = self.len();
        self.intrinsic.retain(|id, _| live(*id));
        self.pairs.retain(|(_, weapon), _| live(*weapon));
        self.weapon_clock.retain(|id, _| live(*id));
        before - self.len()
    }

    /// Drops entries of agents failing `alive`. Returns the number removed.
    pub fn retain_agents(&mut self, alive: impl Fn(AgentId) -> bool) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|(agent, _), _| alive(*agent));
        self.agent_clock.retain(|id, _| alive(*id));
        before - self.pairs.len()
    }

    /// Removes expired and invalidated entries. Returns the number removed.
    pub fn sweep_expired(&mut self, now: Tick) -> usize {
        let before = self.len();
        let ttl = self.ttl_ticks;
        let expired = |computed_at: Tick| now < computed_at || now - computed_at >= ttl;

        let weapon_clock = &self.weapon_clock;
        let agent_clock = &self.agent_clock;
        self.intrinsic.retain(|id, e| {
            !expired(e.computed_at) && e.generation >= weapon_clock.get(id).copied().unwrap_or(0)
        });
        self.pairs.retain(|(agent, weapon), e| {
            !expired(e.computed_at)
                && e.generation >= weapon_clock.get(weapon).copied().unwrap_or(0)
                && e.generation >= agent_clock.get(agent).copied().unwrap_or(0)
        });

        // Every surviving entry is at or past its subjects' clocks
        self.weapon_clock.clear();
        self.agent_clock.clear();

        before - self.len()
    }

    pub fn clear(&mut self) {
        self.intrinsic.clear();
        self.pairs.clear();
        self.weapon_clock.clear();
        self.agent_clock.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoreError;
    use armory_events::{fixtures, OutfitFilter, Position, WeaponDefId};
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingOracle {
        intrinsic_calls: Cell<usize>,
        agent_calls: Cell<usize>,
    }

    impl ScoringOracle for CountingOracle {
        fn intrinsic_score(&self, weapon: &WeaponSnapshot) -> Result<f32, ScoreError> {
            self.intrinsic_calls.set(self.intrinsic_calls.get() + 1);
            if weapon.stats.cooldown <= 0.0 {
                return Err(ScoreError::NonFinite(weapon.def.clone()));
            }
            Ok(weapon.stats.damage)
        }

        fn agent_score(
            &self,
            agent: &AgentSnapshot,
            _weapon: &WeaponSnapshot,
            intrinsic: f32,
        ) -> Result<f32, ScoreError> {
            self.agent_calls.set(self.agent_calls.get() + 1);
            Ok(intrinsic * agent.skills.shooting as f32)
        }
    }

    fn cache() -> ScoreCache {
        ScoreCache::new(&CacheConfig::default(), &ScoringConfig::default())
    }

    fn setup() -> (AgentSnapshot, WeaponSnapshot) {
        (
            fixtures::colonist(1, Position::new(0, 0)),
            fixtures::ranged(10, "Gun_Rifle", 10.0, Position::new(3, 3)),
        )
    }

    #[test]
    fn test_repeated_lookup_calls_oracle_once() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (agent, gun) = setup();
        let mut cache = cache();

        let first = cache.score(&agent, &gun, &oracle, &caps, 100);
        let second = cache.score(&agent, &gun, &oracle, &caps, 101);

        assert_eq!(first, 50.0);
        assert_eq!(first, second);
        assert_eq!(oracle.agent_calls.get(), 1);
        assert_eq!(oracle.intrinsic_calls.get(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_intrinsic_tier_shared_between_agents() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (agent, gun) = setup();
        let other = fixtures::colonist(2, Position::new(0, 0));
        let mut cache = cache();

        cache.score(&agent, &gun, &oracle, &caps, 0);
        cache.score(&other, &gun, &oracle, &caps, 0);

        assert_eq!(oracle.intrinsic_calls.get(), 1);
        assert_eq!(oracle.agent_calls.get(), 2);
    }

    #[test]
    fn test_invalidation_within_same_tick() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (agent, mut gun) = setup();
        let mut cache = cache();

        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 7), 50.0);
        gun.stats.damage = 20.0;
        cache.invalidate_weapon(gun.id);
        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 7), 100.0);
        assert_eq!(oracle.intrinsic_calls.get(), 2);
    }

    #[test]
    fn test_agent_invalidation_keeps_intrinsic_tier() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (mut agent, gun) = setup();
        let mut cache = cache();

        cache.score(&agent, &gun, &oracle, &caps, 0);
        agent.skills.shooting = 10;
        cache.invalidate_agent(agent.id);

        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 0), 100.0);
        assert_eq!(oracle.intrinsic_calls.get(), 1);
        assert_eq!(oracle.agent_calls.get(), 2);
    }

    #[test]
    fn test_host_stamps_invalidate_without_event() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (mut agent, mut gun) = setup();
        let mut cache = cache();

        cache.score(&agent, &gun, &oracle, &caps, 0);
        gun.modified_tick = 5;
        gun.stats.damage = 1.0;
        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 6), 5.0);

        agent.skills_changed_tick = 6;
        agent.skills.shooting = 2;
        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 6), 2.0);
    }

    #[test]
    fn test_ttl_expiry() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (agent, gun) = setup();
        let mut cache = ScoreCache::new(
            &CacheConfig {
                ttl_ticks: 10,
                ..CacheConfig::default()
            },
            &ScoringConfig::default(),
        );

        cache.score(&agent, &gun, &oracle, &caps, 0);
        cache.score(&agent, &gun, &oracle, &caps, 9);
        assert_eq!(oracle.agent_calls.get(), 1);
        cache.score(&agent, &gun, &oracle, &caps, 10);
        assert_eq!(oracle.agent_calls.get(), 2);
    }

    #[test]
    fn test_outfit_disallowed_is_unusable_and_uncached() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (mut agent, gun) = setup();
        agent.outfit = OutfitFilter::Deny([WeaponDefId::from("Gun_Rifle")].into());
        let mut cache = cache();

        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 0), UNUSABLE_SCORE);
        assert_eq!(oracle.intrinsic_calls.get(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oracle_fault_is_unusable_and_uncached() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (agent, mut gun) = setup();
        gun.stats.cooldown = 0.0;
        let mut cache = cache();

        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 0), UNUSABLE_SCORE);
        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 0), UNUSABLE_SCORE);
        assert_eq!(oracle.intrinsic_calls.get(), 2);
        assert_eq!(cache.stats().faults, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_ammo_penalty() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::resolve(&ScoringConfig::default(), true);
        let (mut agent, mut gun) = setup();
        gun.ammo_kind = Some("rifle_rounds".to_string());
        let mut cache = cache();

        assert!((cache.score(&agent, &gun, &oracle, &caps, 0) - 5.0).abs() < 1e-4);

        agent.carried_ammo.insert("rifle_rounds".to_string(), 50);
        cache.invalidate_agent(agent.id);
        assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 0), 50.0);
    }

    #[test]
    fn test_full_cache_computes_without_storing() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let agent = fixtures::colonist(1, Position::new(0, 0));
        let mut cache = ScoreCache::new(
            &CacheConfig {
                max_entries: 2,
                ..CacheConfig::default()
            },
            &ScoringConfig::default(),
        );

        for i in 0..5 {
            let gun = fixtures::ranged(i, "Gun_Rifle", 10.0, Position::new(0, 0));
            assert_eq!(cache.score(&agent, &gun, &oracle, &caps, 0), 50.0);
        }
        assert!(cache.len() <= 2);
        assert!(cache.stats().not_stored > 0);
    }

    #[test]
    fn test_purge_and_sweep() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (agent, gun) = setup();
        let other_gun = fixtures::ranged(11, "Gun_Pistol", 5.0, Position::new(0, 0));
        let mut cache = ScoreCache::new(
            &CacheConfig {
                ttl_ticks: 100,
                ..CacheConfig::default()
            },
            &ScoringConfig::default(),
        );

        cache.score(&agent, &gun, &oracle, &caps, 0);
        cache.score(&agent, &other_gun, &oracle, &caps, 50);
        assert_eq!(cache.len(), 4);

        assert_eq!(cache.purge_weapon(gun.id), 2);
        assert_eq!(cache.len(), 2);

        cache.invalidate_agent(agent.id);
        // Pair entry is stale by clock; intrinsic entry survives
        assert_eq!(cache.sweep_expired(60), 1);
        assert_eq!(cache.sweep_expired(200), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.sweep_expired(300), 0);
    }

    #[test]
    fn test_purge_agent() {
        let oracle = CountingOracle::default();
        let caps = Capabilities::neutral();
        let (agent, gun) = setup();
        let mut cache = cache();

        cache.score(&agent, &gun, &oracle, &caps, 0);
        assert_eq!(cache.purge_agent(agent.id), 1);
        assert_eq!(cache.purge_agent(agent.id), 0);
        assert_eq!(cache.len(), 1);
    }
}
