//! Equip Decision Policy
//!
//! Per-agent decision procedure run on each scheduled evaluation:
//!
//! 1. Eligibility: dead, downed, drafted, restrained, non-violent, out of
//!    control or (unless allowed) temporary agents are left alone. Anything
//!    the policy cannot resolve is treated as ineligible.
//! 2. Forced: an agent with a player-assigned primary is skipped entirely.
//! 3. Search: candidates around the agent, minus reserved, blacklisted,
//!    disallowed and unusable weapons.
//! 4. Compare: unarmed agents take the best usable candidate; armed agents
//!    need the best candidate to clear the upgrade threshold ratio.
//! 5. Interrupt: the interruption table decides whether the agent's current
//!    activity may be interrupted, or whether to wait for a later cycle.
//!
//! When the primary slot needs nothing and sidearms are enabled, the same
//! candidate list is used to fill an empty sidearm slot with the other
//! weapon kind or to upgrade a sidearm that was not assigned by the player.
//!
//! The policy only reads shared state (apart from filling the score cache).
//! The caller commits a proposal, claiming the weapon before the next agent
//! is evaluated.

pub mod blacklist;
pub mod interrupt;
pub mod schedule;

use std::collections::HashMap;

use armory_events::{
    AgentId, AgentSnapshot, EquipSlot, JobId, Tick, WeaponDefId, WeaponId, WeaponKind,
    WeaponSnapshot,
};

use crate::capability::Capabilities;
use crate::cache::ScoreCache;
use crate::config::{ArmoryConfig, SidearmConfig};
use crate::forced::ForcedOverrideTracker;
use crate::host::WorldView;
use crate::oracle::{is_usable, ScoringOracle};
use crate::provenance::{ProvenanceTracker, ReservationSet};
use crate::search::CandidateSearch;
use crate::spatial::SpatialWeaponIndex;

use self::blacklist::FailureTracker;
use self::interrupt::{InterruptDecision, InterruptionTable, JobCriticality, Urgency};

/// Why an agent is not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    /// The world does not know the agent
    Unknown,
    /// Not on the map
    NotSpawned,
    Dead,
    Downed,
    Drafted,
    Restrained,
    NonViolent,
    MentalState,
    Temporary,
    NotColonist,
    /// The agent's equipped weapon cannot be resolved
    UnresolvedEquipment,
}

/// Checks whether an agent may be evaluated at all.
pub fn check_eligibility(
    agent: &AgentSnapshot,
    allow_temporary: bool,
) -> Result<(), IneligibleReason> {
    let status = &agent.status;
    if !status.alive {
        return Err(IneligibleReason::Dead);
    }
    if agent.position.is_none() {
        return Err(IneligibleReason::NotSpawned);
    }
    if status.downed {
        return Err(IneligibleReason::Downed);
    }
    if status.restrained {
        return Err(IneligibleReason::Restrained);
    }
    if status.drafted {
        return Err(IneligibleReason::Drafted);
    }
    if status.in_mental_state {
        return Err(IneligibleReason::MentalState);
    }
    if !status.violence_capable {
        return Err(IneligibleReason::NonViolent);
    }
    if !agent.is_colonist {
        return Err(IneligibleReason::NotColonist);
    }
    if agent.is_temporary && !allow_temporary {
        return Err(IneligibleReason::Temporary);
    }
    Ok(())
}

/// Coarse per-agent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Ineligible(IneligibleReason),
    Forced,
    Unarmed,
    Armed,
}

/// Classifies an agent. A missing agent is ineligible.
pub fn classify_agent(
    agent: Option<&AgentSnapshot>,
    forced: &ForcedOverrideTracker,
    allow_temporary: bool,
) -> AgentState {
    let Some(agent) = agent else {
        return AgentState::Ineligible(IneligibleReason::Unknown);
    };
    if let Err(reason) = check_eligibility(agent, allow_temporary) {
        return AgentState::Ineligible(reason);
    }
    if forced.has_forced_primary(agent.id) {
        AgentState::Forced
    } else if agent.is_unarmed() {
        AgentState::Unarmed
    } else {
        AgentState::Armed
    }
}

/// Candidate score relative to the current score.
///
/// Infinite when the current score is zero or negative and the candidate is positive.
pub fn upgrade_ratio(current: f32, candidate: f32) -> f32 {
    if current > 0.0 {
        candidate / current
    } else if candidate > 0.0 {
        f32::INFINITY
    } else {
        0.0
    }
}

/// Whether `candidate` clears the upgrade threshold over `current`.
///
/// Compares by ratio: `candidate / current >= 1 + threshold`. When the
/// current score is zero, negative or unusable, any positive candidate
/// scoring above it counts as an upgrade.
pub fn is_upgrade(current: f32, candidate: f32, threshold: f32) -> bool {
    if !is_usable(candidate) {
        return false;
    }
    if !is_usable(current) || current <= 0.0 {
        return candidate > 0.0 && candidate > current;
    }
    (candidate as f64 / current as f64) >= 1.0 + threshold as f64
}

/// A job the policy wants issued.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub agent: AgentId,
    pub weapon: WeaponId,
    pub def: WeaponDefId,
    pub slot: EquipSlot,
    pub score: f32,
    /// Score of the weapon being replaced, `None` when the slot is empty
    pub current_score: Option<f32>,
    pub previous_def: Option<WeaponDefId>,
    pub urgency: Urgency,
    pub interrupt: bool,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Ineligible(IneligibleReason),
    /// Player-assigned primary; no search
    Forced,
    /// An engine job is already on its way
    JobInFlight(JobId),
    NoCandidates,
    NoUpgrade,
    /// An upgrade exists but the current activity must not be interrupted
    Blocked(JobCriticality),
    Propose(Proposal),
}

impl Verdict {
    /// Short name used in log output.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Ineligible(_) => "ineligible",
            Verdict::Forced => "forced",
            Verdict::JobInFlight(_) => "job_in_flight",
            Verdict::NoCandidates => "no_candidates",
            Verdict::NoUpgrade => "no_upgrade",
            Verdict::Blocked(_) => "blocked",
            Verdict::Propose(_) => "propose",
        }
    }
}

/// Shared state an evaluation reads.
pub struct PolicyContext<'a> {
    pub world: &'a dyn WorldView,
    pub index: &'a SpatialWeaponIndex,
    pub cache: &'a mut ScoreCache,
    pub oracle: &'a dyn ScoringOracle,
    pub capabilities: &'a Capabilities,
    pub forced: &'a ForcedOverrideTracker,
    pub provenance: &'a ProvenanceTracker,
    pub reservations: &'a ReservationSet,
    pub failures: &'a FailureTracker,
}

#[derive(Debug, Clone)]
struct Scored {
    weapon: WeaponId,
    def: WeaponDefId,
    distance_sq: i64,
    score: f32,
    kind: WeaponKind,
}

#[derive(Debug, Clone)]
pub struct EquipDecisionPolicy {
    threshold: f32,
    allow_temporary: bool,
    sidearms: SidearmConfig,
    interruption: InterruptionTable,
    search: CandidateSearch,
}

impl EquipDecisionPolicy {
    pub fn new(config: &ArmoryConfig) -> Self {
        Self {
            threshold: config.upgrade.threshold_fraction,
            allow_temporary: config.general.allow_temporary_agents,
            sidearms: config.sidearms.clone(),
            interruption: config.interruption.clone(),
            search: CandidateSearch::new(&config.search),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn allow_temporary(&self) -> bool {
        self.allow_temporary
    }

    pub fn search(&self) -> &CandidateSearch {
        &self.search
    }

    pub fn evaluate(&self, ctx: &mut PolicyContext<'_>, agent_id: AgentId, now: Tick) -> Verdict {
        let world = ctx.world;
        let Some(agent) = world.agent(agent_id) else {
            return Verdict::Ineligible(IneligibleReason::Unknown);
        };
        if let Err(reason) = check_eligibility(agent, self.allow_temporary) {
            return Verdict::Ineligible(reason);
        }
        if let Some(job) = ctx.provenance.in_flight_for(agent.id) {
            return Verdict::JobInFlight(job);
        }
        if ctx.forced.has_forced_primary(agent.id) {
            return Verdict::Forced;
        }

        let current = match agent.primary {
            None => None,
            Some(id) => match world.weapon(id) {
                Some(weapon) => Some(weapon),
                None => return Verdict::Ineligible(IneligibleReason::UnresolvedEquipment),
            },
        };

        let reservations = ctx.reservations;
        let failures = ctx.failures;
        let (oracle, capabilities) = (ctx.oracle, ctx.capabilities);
        let cache = &mut *ctx.cache;
        // Scored while searching so unusable weapons never fill the candidate list
        let mut scores: HashMap<WeaponId, f32> = HashMap::new();
        let result = self.search.search(ctx.index, world, agent, |w| {
            if reservations.is_reserved_by_other(w.id, agent.id)
                || failures.is_blacklisted(agent.id, &w.def, now)
            {
                return false;
            }
            let score = *scores
                .entry(w.id)
                .or_insert_with(|| cache.score(agent, w, oracle, capabilities, now));
            is_usable(score)
        });

        let mut scored = Vec::with_capacity(result.candidates.len());
        for candidate in result.candidates {
            let (Some(weapon), Some(score)) =
                (world.weapon(candidate.weapon), scores.get(&candidate.weapon))
            else {
                continue;
            };
            scored.push(Scored {
                weapon: candidate.weapon,
                def: candidate.def,
                distance_sq: candidate.distance_sq,
                score: *score,
                kind: weapon.stats.kind,
            });
        }
        // Best first; ties go to the closer weapon, then the lower id
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.distance_sq.cmp(&b.distance_sq))
                .then(a.weapon.cmp(&b.weapon))
        });

        let Some(best) = scored.first() else {
            return Verdict::NoCandidates;
        };

        let current_score = current
            .map(|weapon| ctx.cache.score(agent, weapon, ctx.oracle, ctx.capabilities, now));

        let urgency = match current_score {
            None => Some(Urgency::Unarmed),
            Some(cs) if is_upgrade(cs, best.score, self.threshold) => Some(Urgency::Upgrade {
                ratio: upgrade_ratio(cs, best.score),
            }),
            Some(_) => None,
        };
        if let Some(urgency) = urgency {
            return self.propose(
                agent,
                best,
                EquipSlot::Primary,
                current_score,
                current.map(|w| w.def.clone()),
                urgency,
            );
        }

        if self.sidearms.enabled {
            if let Some(primary) = current {
                if let Some(verdict) = self.evaluate_sidearms(ctx, agent, primary, &scored, now) {
                    return verdict;
                }
            }
        }

        Verdict::NoUpgrade
    }

    fn evaluate_sidearms(
        &self,
        ctx: &mut PolicyContext<'_>,
        agent: &AgentSnapshot,
        primary: &WeaponSnapshot,
        scored: &[Scored],
        now: Tick,
    ) -> Option<Verdict> {
        let world = ctx.world;
        let carried: Vec<&WeaponSnapshot> = agent
            .sidearms
            .iter()
            .filter_map(|id| world.weapon(*id))
            .collect();

        let primary_kind = primary.stats.kind;
        let has_complement = carried.iter().any(|w| w.stats.kind != primary_kind);
        if !has_complement && agent.sidearms.len() < self.sidearms.max_sidearms {
            if let Some(best) = scored.iter().find(|s| s.kind != primary_kind) {
                // Filling an empty slot is a modest gain; it only interrupts idle work
                return Some(self.propose(
                    agent,
                    best,
                    EquipSlot::Sidearm { replaces: None },
                    None,
                    None,
                    Urgency::Upgrade { ratio: 1.0 },
                ));
            }
        }

        let mut best_upgrade: Option<(f32, &Scored, &WeaponSnapshot, f32)> = None;
        for sidearm in carried {
            if ctx.forced.is_forced(agent.id, sidearm.id, &sidearm.def) {
                continue;
            }
            let Some(candidate) = scored.iter().find(|s| s.kind == sidearm.stats.kind) else {
                continue;
            };
            let current = ctx
                .cache
                .score(agent, sidearm, ctx.oracle, ctx.capabilities, now);
            if !is_upgrade(current, candidate.score, self.threshold) {
                continue;
            }
            let ratio = upgrade_ratio(current, candidate.score);
            if best_upgrade.map_or(true, |(r, ..)| ratio > r) {
                best_upgrade = Some((ratio, candidate, sidearm, current));
            }
        }

        best_upgrade.map(|(ratio, candidate, sidearm, current)| {
            self.propose(
                agent,
                candidate,
                EquipSlot::Sidearm {
                    replaces: Some(sidearm.id),
                },
                Some(current),
                Some(sidearm.def.clone()),
                Urgency::Upgrade { ratio },
            )
        })
    }

    fn propose(
        &self,
        agent: &AgentSnapshot,
        candidate: &Scored,
        slot: EquipSlot,
        current_score: Option<f32>,
        previous_def: Option<WeaponDefId>,
        urgency: Urgency,
    ) -> Verdict {
        let decision = self
            .interruption
            .decide(agent.current_job.as_ref(), urgency);
        if let InterruptDecision::Blocked(criticality) = decision {
            tracing::debug!(
                "{}: {} would help but current {:?} work must not be interrupted",
                agent.id,
                candidate.def,
                criticality
            );
            return Verdict::Blocked(criticality);
        }
        Verdict::Propose(Proposal {
            agent: agent.id,
            weapon: candidate.weapon,
            def: candidate.def.clone(),
            slot,
            score: candidate.score,
            current_score,
            previous_def,
            urgency,
            interrupt: decision == InterruptDecision::Interrupt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, FailureConfig, IndexConfig, ScoringConfig};
    use crate::error::ScoreError;
    use crate::host::MemoryWorld;
    use crate::oracle::UNUSABLE_SCORE;
    use armory_events::{fixtures, CurrentJob, FailureReason, Position};

    /// Scores a weapon by its damage, ignoring the agent.
    struct DamageOracle;

    impl ScoringOracle for DamageOracle {
        fn intrinsic_score(&self, weapon: &WeaponSnapshot) -> Result<f32, ScoreError> {
            Ok(weapon.stats.damage)
        }

        fn agent_score(
            &self,
            _agent: &AgentSnapshot,
            _weapon: &WeaponSnapshot,
            intrinsic: f32,
        ) -> Result<f32, ScoreError> {
            Ok(intrinsic)
        }
    }

    struct Harness {
        world: MemoryWorld,
        index: SpatialWeaponIndex,
        cache: ScoreCache,
        capabilities: Capabilities,
        forced: ForcedOverrideTracker,
        provenance: ProvenanceTracker,
        reservations: ReservationSet,
        failures: FailureTracker,
        policy: EquipDecisionPolicy,
    }

    impl Harness {
        fn new(config: ArmoryConfig) -> Self {
            Self {
                world: MemoryWorld::new(),
                index: SpatialWeaponIndex::new(&IndexConfig::default()),
                cache: ScoreCache::new(&CacheConfig::default(), &ScoringConfig::default()),
                capabilities: Capabilities::neutral(),
                forced: ForcedOverrideTracker::new(),
                provenance: ProvenanceTracker::new(),
                reservations: ReservationSet::new(),
                failures: FailureTracker::new(&FailureConfig::default()),
                policy: EquipDecisionPolicy::new(&config),
            }
        }

        fn ground(&mut self, weapon: WeaponSnapshot) {
            self.index.add(&weapon);
            self.world.insert_weapon(weapon);
        }

        /// Puts a weapon in the agent's hands.
        fn hold(&mut self, agent: u64, mut weapon: WeaponSnapshot, primary: bool) {
            weapon.position = None;
            let id = weapon.id;
            self.world.insert_weapon(weapon);
            let agent = self.world.agent_mut(AgentId(agent)).unwrap();
            if primary {
                agent.primary = Some(id);
            } else {
                agent.sidearms.push(id);
            }
        }

        fn evaluate(&mut self, agent: u64) -> Verdict {
            let mut ctx = PolicyContext {
                world: &self.world,
                index: &self.index,
                cache: &mut self.cache,
                oracle: &DamageOracle,
                capabilities: &self.capabilities,
                forced: &self.forced,
                provenance: &self.provenance,
                reservations: &self.reservations,
                failures: &self.failures,
            };
            self.policy.evaluate(&mut ctx, AgentId(agent), 0)
        }
    }

    fn proposal(verdict: Verdict) -> Proposal {
        match verdict {
            Verdict::Propose(p) => p,
            other => panic!("expected a proposal, got {:?}", other),
        }
    }

    fn no_sidearms() -> ArmoryConfig {
        let mut config = ArmoryConfig::default();
        config.sidearms.enabled = false;
        config
    }

    #[test]
    fn test_eligibility_fails_closed() {
        let mut agent = fixtures::colonist(1, Position::new(0, 0));
        assert!(check_eligibility(&agent, false).is_ok());

        agent.status.drafted = true;
        assert_eq!(check_eligibility(&agent, false), Err(IneligibleReason::Drafted));
        agent.status.drafted = false;

        agent.is_temporary = true;
        assert_eq!(check_eligibility(&agent, false), Err(IneligibleReason::Temporary));
        assert!(check_eligibility(&agent, true).is_ok());

        agent.position = None;
        assert_eq!(check_eligibility(&agent, true), Err(IneligibleReason::NotSpawned));

        let forced = ForcedOverrideTracker::new();
        assert_eq!(
            classify_agent(None, &forced, false),
            AgentState::Ineligible(IneligibleReason::Unknown)
        );
    }

    #[test]
    fn test_classify_agent() {
        let mut forced = ForcedOverrideTracker::new();
        let mut agent = fixtures::colonist(1, Position::new(0, 0));
        assert_eq!(classify_agent(Some(&agent), &forced, false), AgentState::Unarmed);

        agent.primary = Some(WeaponId(5));
        assert_eq!(classify_agent(Some(&agent), &forced, false), AgentState::Armed);

        forced.set_forced(agent.id, WeaponId(5), WeaponDefId::from("Gun_Rifle"), 0);
        assert_eq!(classify_agent(Some(&agent), &forced, false), AgentState::Forced);
    }

    #[test]
    fn test_upgrade_threshold_is_a_ratio() {
        assert!(is_upgrade(100.0, 105.1, 0.05));
        assert!(!is_upgrade(100.0, 104.9, 0.05));
        assert!(is_upgrade(1000.0, 1051.0, 0.05));
        assert!(!is_upgrade(1000.0, 1049.0, 0.05));

        // Non-positive current: any better positive candidate
        assert!(is_upgrade(0.0, 1.0, 0.05));
        assert!(is_upgrade(-5.0, 0.5, 0.05));
        assert!(!is_upgrade(0.0, 0.0, 0.05));
        assert!(is_upgrade(UNUSABLE_SCORE, 1.0, 0.05));
        assert!(!is_upgrade(10.0, UNUSABLE_SCORE, 0.05));
    }

    #[test]
    fn test_unarmed_agent_takes_any_usable_weapon() {
        let mut h = Harness::new(no_sidearms());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        h.ground(fixtures::melee(10, "MeleeWeapon_Club", 1.0, Position::new(4, 0)));

        let p = proposal(h.evaluate(1));
        assert_eq!(p.weapon, WeaponId(10));
        assert_eq!(p.urgency, Urgency::Unarmed);
        assert_eq!(p.current_score, None);
        assert!(!p.interrupt);
    }

    #[test]
    fn test_best_candidate_wins_ties_go_to_closer() {
        let mut h = Harness::new(no_sidearms());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        h.ground(fixtures::ranged(10, "Gun_A", 10.0, Position::new(9, 0)));
        h.ground(fixtures::ranged(11, "Gun_B", 10.0, Position::new(3, 0)));
        h.ground(fixtures::ranged(12, "Gun_C", 5.0, Position::new(1, 0)));

        assert_eq!(proposal(h.evaluate(1)).weapon, WeaponId(11));
    }

    #[test]
    fn test_armed_agent_needs_threshold() {
        let mut h = Harness::new(no_sidearms());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        h.hold(1, fixtures::ranged(5, "Gun_Old", 100.0, Position::new(0, 0)), true);
        h.ground(fixtures::ranged(10, "Gun_Slight", 104.0, Position::new(2, 0)));
        assert_eq!(h.evaluate(1), Verdict::NoUpgrade);

        h.ground(fixtures::ranged(11, "Gun_Better", 120.0, Position::new(5, 0)));
        let p = proposal(h.evaluate(1));
        assert_eq!(p.weapon, WeaponId(11));
        assert_eq!(p.previous_def, Some(WeaponDefId::from("Gun_Old")));
        assert!(matches!(p.urgency, Urgency::Upgrade { ratio } if (ratio - 1.2).abs() < 1e-4));
    }

    #[test]
    fn test_forced_agent_is_skipped() {
        let mut h = Harness::new(no_sidearms());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        h.hold(1, fixtures::ranged(5, "Gun_Weak", 10.0, Position::new(0, 0)), true);
        h.ground(fixtures::ranged(10, "Gun_Godly", 10_000.0, Position::new(1, 0)));
        h.forced
            .set_forced(AgentId(1), WeaponId(5), WeaponDefId::from("Gun_Weak"), 0);

        assert_eq!(h.evaluate(1), Verdict::Forced);
    }

    #[test]
    fn test_reserved_and_blacklisted_weapons_excluded() {
        let mut h = Harness::new(no_sidearms());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        h.ground(fixtures::ranged(10, "Gun_Reserved", 50.0, Position::new(1, 0)));
        h.ground(fixtures::ranged(11, "Gun_Cursed", 40.0, Position::new(1, 0)));
        h.ground(fixtures::ranged(12, "Gun_Plain", 10.0, Position::new(1, 0)));

        h.reservations.claim(WeaponId(10), AgentId(2), JobId(99));
        for t in 0..3 {
            h.failures.record_failure(
                AgentId(1),
                &WeaponDefId::from("Gun_Cursed"),
                FailureReason::Restricted,
                t,
            );
        }

        assert_eq!(proposal(h.evaluate(1)).weapon, WeaponId(12));
    }

    #[test]
    fn test_outfit_disallowed_candidates_ignored() {
        let mut h = Harness::new(no_sidearms());
        let mut agent = fixtures::colonist(1, Position::new(0, 0));
        agent.outfit =
            armory_events::OutfitFilter::Deny([WeaponDefId::from("Gun_Banned")].into());
        h.world.insert_agent(agent);
        h.ground(fixtures::ranged(10, "Gun_Banned", 500.0, Position::new(1, 0)));

        assert_eq!(h.evaluate(1), Verdict::NoCandidates);
    }

    #[test]
    fn test_disallowed_weapons_nearby_do_not_hide_allowed_one() {
        let mut h = Harness::new(no_sidearms());
        let mut agent = fixtures::colonist(1, Position::new(0, 0));
        agent.outfit =
            armory_events::OutfitFilter::Deny([WeaponDefId::from("Gun_Banned")].into());
        h.world.insert_agent(agent);
        for i in 0..25 {
            let position = Position::new(i % 5 + 1, i / 5 + 1);
            h.ground(fixtures::ranged(i as u64 + 10, "Gun_Banned", 500.0, position));
        }
        h.ground(fixtures::ranged(99, "Gun_Allowed", 10.0, Position::new(12, 0)));

        let p = proposal(h.evaluate(1));
        assert_eq!(p.weapon, WeaponId(99));
        assert_eq!(p.urgency, Urgency::Unarmed);
    }

    #[test]
    fn test_unusable_weapons_do_not_stop_radius_expansion() {
        let mut h = Harness::new(no_sidearms());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        for i in 1..=3 {
            let position = Position::new(i, 0);
            h.ground(fixtures::ranged(i as u64, "Gun_Broken", 2.0 * UNUSABLE_SCORE, position));
        }
        h.ground(fixtures::ranged(99, "Gun_Far", 10.0, Position::new(50, 0)));

        let p = proposal(h.evaluate(1));
        assert_eq!(p.weapon, WeaponId(99));
    }

    #[test]
    fn test_critical_activity_blocks_even_unarmed() {
        let mut h = Harness::new(no_sidearms());
        let mut agent = fixtures::colonist(1, Position::new(0, 0));
        agent.current_job = Some(CurrentJob::new(JobId(7), "flee"));
        h.world.insert_agent(agent);
        h.ground(fixtures::ranged(10, "Gun_A", 10.0, Position::new(1, 0)));

        assert_eq!(h.evaluate(1), Verdict::Blocked(JobCriticality::Critical));
    }

    #[test]
    fn test_medium_work_needs_higher_bar() {
        let mut h = Harness::new(no_sidearms());
        let mut agent = fixtures::colonist(1, Position::new(0, 0));
        agent.current_job = Some(CurrentJob::new(JobId(7), "construct"));
        h.world.insert_agent(agent);
        h.hold(1, fixtures::ranged(5, "Gun_Old", 100.0, Position::new(0, 0)), true);
        h.ground(fixtures::ranged(10, "Gun_Bit", 106.0, Position::new(1, 0)));

        assert_eq!(h.evaluate(1), Verdict::Blocked(JobCriticality::Medium));

        h.ground(fixtures::ranged(11, "Gun_Lot", 115.0, Position::new(1, 0)));
        let p = proposal(h.evaluate(1));
        assert_eq!(p.weapon, WeaponId(11));
        assert!(p.interrupt);
    }

    #[test]
    fn test_in_flight_job_short_circuits() {
        let mut h = Harness::new(no_sidearms());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        h.ground(fixtures::ranged(10, "Gun_A", 10.0, Position::new(1, 0)));
        h.provenance.register(
            JobId(3),
            crate::provenance::ProvenanceRecord {
                agent: AgentId(1),
                weapon: WeaponId(10),
                def: WeaponDefId::from("Gun_A"),
                previous_def: None,
                slot: EquipSlot::Primary,
                issued_at: 0,
            },
        );
        assert_eq!(h.evaluate(1), Verdict::JobInFlight(JobId(3)));
    }

    #[test]
    fn test_unresolvable_primary_fails_closed() {
        let mut h = Harness::new(no_sidearms());
        let mut agent = fixtures::colonist(1, Position::new(0, 0));
        agent.primary = Some(WeaponId(404));
        h.world.insert_agent(agent);
        h.ground(fixtures::ranged(10, "Gun_A", 10.0, Position::new(1, 0)));

        assert_eq!(
            h.evaluate(1),
            Verdict::Ineligible(IneligibleReason::UnresolvedEquipment)
        );
    }

    #[test]
    fn test_sidearm_fill_with_other_kind() {
        let mut h = Harness::new(ArmoryConfig::default());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        h.hold(1, fixtures::ranged(5, "Gun_Rifle", 100.0, Position::new(0, 0)), true);
        h.ground(fixtures::melee(10, "MeleeWeapon_Knife", 8.0, Position::new(1, 0)));

        let p = proposal(h.evaluate(1));
        assert_eq!(p.weapon, WeaponId(10));
        assert_eq!(p.slot, EquipSlot::Sidearm { replaces: None });
    }

    #[test]
    fn test_sidearm_upgrade_skips_forced_defs() {
        let mut h = Harness::new(ArmoryConfig::default());
        h.world.insert_agent(fixtures::colonist(1, Position::new(0, 0)));
        h.hold(1, fixtures::ranged(5, "Gun_Rifle", 100.0, Position::new(0, 0)), true);
        h.hold(1, fixtures::melee(6, "MeleeWeapon_Knife", 5.0, Position::new(0, 0)), false);
        h.ground(fixtures::melee(10, "MeleeWeapon_Sword", 20.0, Position::new(1, 0)));

        let p = proposal(h.evaluate(1));
        assert_eq!(
            p.slot,
            EquipSlot::Sidearm {
                replaces: Some(WeaponId(6))
            }
        );
        assert_eq!(p.previous_def, Some(WeaponDefId::from("MeleeWeapon_Knife")));

        h.forced
            .add_forced_def(AgentId(1), WeaponDefId::from("MeleeWeapon_Knife"));
        assert_eq!(h.evaluate(1), Verdict::NoUpgrade);
    }
}
