//! Armory Engine
//!
//! The facade the host talks to. It owns every component, routes inbound
//! [`WorldEvent`]s to the index, cache and trackers, runs scheduled
//! evaluations and staggered maintenance from [`ArmoryEngine::tick`], and
//! commits policy proposals as [`EquipJob`]s.
//!
//! Committing is the only place shared state changes on behalf of a
//! decision: the job id is allocated, the target weapon is claimed and the
//! provenance record is written before the next agent is evaluated, so two
//! agents can never be sent after the same weapon in one tick.

use std::path::Path;

use serde::Serialize;

use armory_events::{
    AgentId, EquipJob, EquipSlot, EquipmentChange, JobId, JobOutcome, Notification, SaveData,
    Tick, WeaponId, WorldEvent, SAVE_DATA_VERSION,
};

use crate::cache::ScoreCache;
use crate::capability::Capabilities;
use crate::config::ArmoryConfig;
use crate::error::{ArmoryError, SaveDataError};
use crate::forced::ForcedOverrideTracker;
use crate::host::WorldView;
use crate::maintenance::{CleanupTarget, Maintainable, MaintenanceReport, StaggeredMaintenance};
use crate::notify::Notifier;
use crate::oracle::{ScoringOracle, StatOracle};
use crate::policy::blacklist::{FailureTracker, FailureVerdict};
use crate::policy::interrupt::Urgency;
use crate::policy::schedule::EvaluationSchedule;
use crate::policy::{EquipDecisionPolicy, PolicyContext, Proposal, Verdict};
use crate::provenance::{ProvenanceRecord, ProvenanceTracker, ReservationSet};
use crate::spatial::{RebuildProgress, SpatialWeaponIndex};
use crate::think_tree::{self, EvaluationDriver, InjectionRule, ThinkNode};

/// Everything one engine tick produced for the host.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub jobs: Vec<EquipJob>,
    pub notifications: Vec<Notification>,
    /// Present on ticks that ran a maintenance step
    pub maintenance: Option<MaintenanceReport>,
}

/// Point-in-time sizes and counters, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineSummary {
    pub indexed_weapons: usize,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub forced_records: usize,
    pub jobs_in_flight: usize,
    pub reservations: usize,
    pub failure_records: usize,
    pub scheduled_agents: usize,
    pub jobs_issued: u64,
    pub notifications_suppressed: u64,
    pub maintenance_cycles: u64,
    pub maintenance_removed: u64,
    pub tick_driven: bool,
}

pub struct ArmoryEngine {
    config: ArmoryConfig,
    oracle: Box<dyn ScoringOracle>,
    capabilities: Capabilities,
    index: SpatialWeaponIndex,
    cache: ScoreCache,
    policy: EquipDecisionPolicy,
    forced: ForcedOverrideTracker,
    provenance: ProvenanceTracker,
    reservations: ReservationSet,
    failures: FailureTracker,
    schedule: EvaluationSchedule,
    notifier: Notifier,
    maintenance: StaggeredMaintenance,
    driver: EvaluationDriver,
    next_job_id: u64,
    jobs_issued: u64,
    pending_notifications: Vec<Notification>,
    last_maintenance: Option<Tick>,
}

impl ArmoryEngine {
    /// Creates an engine with an explicit oracle and capability set.
    pub fn new(
        config: ArmoryConfig,
        oracle: Box<dyn ScoringOracle>,
        capabilities: Capabilities,
    ) -> Result<Self, ArmoryError> {
        config.validate()?;
        tracing::info!(
            "Armory engine starting: threshold {}, capacity {}, ammo capability {}",
            config.upgrade.threshold_fraction,
            config.index.capacity,
            capabilities.ammo.name()
        );

        Ok(Self {
            index: SpatialWeaponIndex::new(&config.index),
            cache: ScoreCache::new(&config.cache, &config.scoring),
            policy: EquipDecisionPolicy::new(&config),
            forced: ForcedOverrideTracker::new(),
            provenance: ProvenanceTracker::new(),
            reservations: ReservationSet::new(),
            failures: FailureTracker::new(&config.failures),
            schedule: EvaluationSchedule::new(&config.schedule, config.general.seed),
            notifier: Notifier::new(&config.notifications),
            maintenance: StaggeredMaintenance::new(&config.maintenance),
            driver: EvaluationDriver::default(),
            next_job_id: 1,
            jobs_issued: 0,
            pending_notifications: Vec::new(),
            last_maintenance: None,
            config,
            oracle,
            capabilities,
        })
    }

    /// Creates an engine with the stat oracle and capabilities resolved against `world`.
    pub fn for_world(config: ArmoryConfig, world: &dyn WorldView) -> Result<Self, ArmoryError> {
        let oracle = StatOracle::new(config.scoring.weights.clone());
        let capabilities = Capabilities::resolve(&config.scoring, world.supports_ammo());
        Self::new(config, Box::new(oracle), capabilities)
    }

    /// Creates an engine from a TOML configuration file.
    pub fn from_config_file(path: &Path, world: &dyn WorldView) -> Result<Self, ArmoryError> {
        let config = ArmoryConfig::from_file(path)?;
        Self::for_world(config, world)
    }

    pub fn config(&self) -> &ArmoryConfig {
        &self.config
    }

    pub fn index(&self) -> &SpatialWeaponIndex {
        &self.index
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    pub fn forced(&self) -> &ForcedOverrideTracker {
        &self.forced
    }

    pub fn provenance(&self) -> &ProvenanceTracker {
        &self.provenance
    }

    pub fn reservations(&self) -> &ReservationSet {
        &self.reservations
    }

    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    pub fn schedule(&self) -> &EvaluationSchedule {
        &self.schedule
    }

    pub fn maintenance(&self) -> &StaggeredMaintenance {
        &self.maintenance
    }

    pub fn driver(&self) -> &EvaluationDriver {
        &self.driver
    }

    pub fn summary(&self) -> EngineSummary {
        let cache = self.cache.stats();
        EngineSummary {
            indexed_weapons: self.index.len(),
            cache_entries: self.cache.len(),
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            forced_records: self.forced.len(),
            jobs_in_flight: self.provenance.len(),
            reservations: self.reservations.len(),
            failure_records: self.failures.len(),
            scheduled_agents: self.schedule.len(),
            jobs_issued: self.jobs_issued,
            notifications_suppressed: self.notifier.suppressed(),
            maintenance_cycles: self.maintenance.cycles_completed(),
            maintenance_removed: self.maintenance.total_removed(),
            tick_driven: self.driver.is_tick_driven(),
        }
    }

    /// Hooks evaluation into the host's think tree, or stays tick-driven if that fails.
    pub fn install_think_tree(
        &mut self,
        tree: &mut ThinkNode,
        rule: &InjectionRule,
    ) -> &EvaluationDriver {
        self.driver = think_tree::install(tree, rule);
        &self.driver
    }

    /// Applies one world mutation.
    pub fn handle_event(&mut self, world: &dyn WorldView, event: WorldEvent) {
        let now = world.current_tick();
        tracing::trace!("Event {} at tick {}", event.kind(), now);

        match event {
            WorldEvent::WeaponSpawned { weapon } => {
                self.index.add(&weapon);
            }
            WorldEvent::WeaponDestroyed { weapon } => self.on_weapon_destroyed(weapon),
            WorldEvent::WeaponMoved { weapon, from, to } => match to {
                None => {
                    self.index.remove(weapon);
                }
                Some(to) if self.index.contains(weapon) => {
                    self.index.move_weapon(weapon, from, to);
                }
                Some(_) => {
                    if let Some(snapshot) = world.weapon(weapon) {
                        self.index.add(snapshot);
                    }
                }
            },
            WorldEvent::WeaponModified { weapon } => self.cache.invalidate_weapon(weapon),
            WorldEvent::EquipmentChanged {
                agent,
                weapon,
                change,
                slot,
                job,
                player_forced,
            } => match change {
                EquipmentChange::Equipped => {
                    self.on_equipped(world, agent, weapon, slot, job, player_forced, now)
                }
                EquipmentChange::Dropped => self.on_dropped(world, agent, weapon),
            },
            WorldEvent::OutfitChanged { agent } | WorldEvent::SkillsChanged { agent } => {
                self.cache.invalidate_agent(agent);
                self.schedule.request_immediate(agent);
            }
            WorldEvent::AgentDestroyed { agent } => self.purge_agent(agent),
            WorldEvent::JobEnded { job, outcome } => self.on_job_ended(job, outcome, now),
        }
    }

    fn on_weapon_destroyed(&mut self, weapon: WeaponId) {
        self.index.remove(weapon);
        self.cache.purge_weapon(weapon);
        if let Some(holder) = self.reservations.holder(weapon) {
            self.reservations.release_weapon(weapon);
            self.schedule.request_immediate(holder.agent);
        }
        for agent in self.forced.clear_weapon(weapon) {
            tracing::debug!("Forced weapon of {} was destroyed", agent);
            self.schedule.request_immediate(agent);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_equipped(
        &mut self,
        world: &dyn WorldView,
        agent: AgentId,
        weapon: WeaponId,
        slot: EquipSlot,
        job: Option<JobId>,
        player_forced: bool,
        now: Tick,
    ) {
        self.index.remove(weapon);
        if let Some(holder) = self.reservations.holder(weapon) {
            if holder.agent != agent {
                // Someone beat our job to it; the host will fail that job
                self.schedule.request_immediate(holder.agent);
            }
        }

        let ours = job.is_some_and(|job| self.provenance.is_auto(job));
        if !player_forced || ours {
            return;
        }
        let Some(def) = world.weapon(weapon).map(|w| w.def.clone()) else {
            tracing::debug!("{} equipped unknown {}; not recording as forced", agent, weapon);
            return;
        };
        match slot {
            EquipSlot::Primary => self.forced.set_forced(agent, weapon, def, now),
            EquipSlot::Sidearm { .. } => {
                self.forced.add_forced_def(agent, def);
            }
        }
    }

    fn on_dropped(&mut self, world: &dyn WorldView, agent: AgentId, weapon: WeaponId) {
        let bound = self
            .forced
            .forced_primary(agent)
            .is_some_and(|f| f.weapon == Some(weapon));
        if bound {
            self.forced.clear_forced(agent);
        }
        if let Some(snapshot) = world.agent(agent) {
            self.forced.reconcile(snapshot, world);
        }
        self.schedule.request_immediate(agent);
    }

    fn purge_agent(&mut self, agent: AgentId) {
        self.cache.purge_agent(agent);
        self.forced.purge_agent(agent);
        self.schedule.forget(agent);
        self.failures.purge_agent(agent);
        for job in self.provenance.purge_agent(agent) {
            self.reservations.release_job(job);
        }
        self.reservations.release_agent(agent);
        self.notifier.retain_agents(|a| a != agent);
        tracing::debug!("Purged {}", agent);
    }

    /// Records how an engine-issued job ended. Jobs the engine did not issue are ignored.
    pub fn on_job_ended(&mut self, job: JobId, outcome: JobOutcome, now: Tick) {
        let Some(record) = self.provenance.take(job) else {
            tracing::trace!("{} ended but was not issued by the engine", job);
            return;
        };
        self.reservations.release_job(job);

        match outcome {
            JobOutcome::Succeeded => {
                self.failures.record_success(record.agent, &record.def);
                let notification = match record.previous_def {
                    Some(from) => Notification::Upgraded {
                        agent: record.agent,
                        from,
                        to: record.def,
                    },
                    None => Notification::Equipped {
                        agent: record.agent,
                        weapon: record.def,
                    },
                };
                if let Some(notification) = self.notifier.offer(notification, now) {
                    self.pending_notifications.push(notification);
                }
            }
            JobOutcome::Failed(reason) => {
                let verdict = self
                    .failures
                    .record_failure(record.agent, &record.def, reason, now);
                if !matches!(verdict, FailureVerdict::Ignored) {
                    self.schedule.request_immediate(record.agent);
                }
            }
            JobOutcome::Abandoned => {
                tracing::debug!("{} for {} was abandoned", job, record.agent);
            }
        }
    }

    /// Advances the engine by one host tick.
    pub fn tick(&mut self, world: &dyn WorldView) -> TickOutput {
        let now = world.current_tick();
        let mut output = TickOutput::default();

        self.index.ensure_initialized(world);
        if let RebuildProgress::Completed { indexed, .. } = self.index.continue_rebuild(world) {
            tracing::debug!("Index ready with {} weapons", indexed);
        }

        let interval = self.config.maintenance.interval_ticks.max(1);
        let maintenance_due = self
            .last_maintenance
            .map_or(true, |last| now.saturating_sub(last) >= interval);
        if maintenance_due {
            self.last_maintenance = Some(now);
            output.maintenance = Some(self.run_maintenance(world));
        }

        if self.config.general.enabled && self.driver.is_tick_driven() {
            let agents = world.agent_ids();
            let due = self.schedule.due_agents(&agents, now);
            for agent in due
                .into_iter()
                .take(self.config.general.max_evaluations_per_tick)
            {
                if let Some(job) = self.evaluate_agent(world, agent) {
                    output.jobs.push(job);
                }
            }
        }

        output.notifications = std::mem::take(&mut self.pending_notifications);
        output
    }

    /// Evaluates one agent and issues a job when the policy proposes one.
    ///
    /// Called from [`Self::tick`] in tick-driven mode, or by the host's think
    /// tree node otherwise.
    pub fn evaluate_agent(&mut self, world: &dyn WorldView, agent_id: AgentId) -> Option<EquipJob> {
        if !self.config.general.enabled {
            return None;
        }
        let now = world.current_tick();

        let verdict = {
            let mut ctx = PolicyContext {
                world,
                index: &self.index,
                cache: &mut self.cache,
                oracle: self.oracle.as_ref(),
                capabilities: &self.capabilities,
                forced: &self.forced,
                provenance: &self.provenance,
                reservations: &self.reservations,
                failures: &self.failures,
            };
            self.policy.evaluate(&mut ctx, agent_id, now)
        };

        match world.agent(agent_id) {
            Some(agent) => {
                self.schedule
                    .schedule_next(agent_id, now, world.colonist_count(), agent.is_unarmed());
            }
            None => {
                self.schedule.forget(agent_id);
            }
        }

        match verdict {
            Verdict::Propose(proposal) => self.commit(proposal, now),
            other => {
                tracing::trace!("{}: {}", agent_id, other.label());
                None
            }
        }
    }

    fn commit(&mut self, proposal: Proposal, now: Tick) -> Option<EquipJob> {
        let job_id = JobId(self.next_job_id);
        if !self
            .reservations
            .claim(proposal.weapon, proposal.agent, job_id)
        {
            tracing::debug!(
                "{} lost {} to another agent before commit",
                proposal.agent,
                proposal.weapon
            );
            return None;
        }
        self.next_job_id += 1;
        self.jobs_issued += 1;

        self.provenance.register(
            job_id,
            ProvenanceRecord {
                agent: proposal.agent,
                weapon: proposal.weapon,
                def: proposal.def.clone(),
                previous_def: proposal.previous_def.clone(),
                slot: proposal.slot,
                issued_at: now,
            },
        );

        let expiry = match proposal.urgency {
            Urgency::Unarmed => None,
            Urgency::Upgrade { .. } => Some(now + self.config.jobs.expiry_ticks),
        };
        tracing::info!(
            "{}: {} to equip {} ({}) as {:?}, score {:.2} over {:?}",
            job_id,
            proposal.agent,
            proposal.def,
            proposal.weapon,
            proposal.slot,
            proposal.score,
            proposal.current_score
        );

        Some(EquipJob {
            job_id,
            agent: proposal.agent,
            target_weapon: proposal.weapon,
            target_def: proposal.def,
            slot: proposal.slot,
            is_forced: false,
            is_auto_generated: true,
            expiry,
            interrupt_current: proposal.interrupt,
        })
    }

    /// Runs the next maintenance step immediately.
    pub fn run_maintenance(&mut self, world: &dyn WorldView) -> MaintenanceReport {
        let mut scope = MaintenanceScope {
            world,
            now: world.current_tick(),
            retention: self.config.jobs.retention_ticks,
            index: &mut self.index,
            cache: &mut self.cache,
            forced: &mut self.forced,
            provenance: &mut self.provenance,
            reservations: &mut self.reservations,
            failures: &mut self.failures,
            schedule: &mut self.schedule,
            notifier: &mut self.notifier,
        };
        self.maintenance.tick(&mut scope)
    }

    /// Forced override records for persistence.
    pub fn save_data(&self) -> SaveData {
        self.forced.to_save_data()
    }

    /// Restores forced override records. Primary records rebind on the next reconcile.
    pub fn load_save_data(&mut self, data: &SaveData, now: Tick) -> Result<(), SaveDataError> {
        if data.version != SAVE_DATA_VERSION {
            return Err(SaveDataError::UnsupportedVersion {
                found: data.version,
                expected: SAVE_DATA_VERSION,
            });
        }
        self.forced.load(data, now);
        tracing::info!("Loaded {} forced override records", self.forced.len());
        Ok(())
    }

    pub fn load_save_json(&mut self, json: &str, now: Tick) -> Result<(), SaveDataError> {
        let data = SaveData::from_json(json)?;
        self.load_save_data(&data, now)
    }
}

/// Mutable view of the engine state a maintenance step may clean.
struct MaintenanceScope<'a> {
    world: &'a dyn WorldView,
    now: Tick,
    retention: u64,
    index: &'a mut SpatialWeaponIndex,
    cache: &'a mut ScoreCache,
    forced: &'a mut ForcedOverrideTracker,
    provenance: &'a mut ProvenanceTracker,
    reservations: &'a mut ReservationSet,
    failures: &'a mut FailureTracker,
    schedule: &'a mut EvaluationSchedule,
    notifier: &'a mut Notifier,
}

impl MaintenanceScope<'_> {
    fn purge_dead_agents(&mut self) -> usize {
        let world = self.world;
        let alive = |agent: AgentId| world.agent(agent).is_some();

        let mut removed = self.cache.retain_agents(alive);
        removed += self.failures.retain_agents(alive);
        removed += self.schedule.retain_agents(alive);
        removed += self.notifier.retain_agents(alive);

        let jobs = self.provenance.retain_agents(alive);
        for job in &jobs {
            self.reservations.release_job(*job);
        }
        removed += jobs.len();
        removed += self.reservations.retain(|_, r| alive(r.agent));

        for agent in self.forced.agents() {
            match world.agent(agent) {
                Some(snapshot) => removed += self.forced.reconcile(snapshot, world),
                None => removed += self.forced.purge_agent(agent),
            }
        }
        removed
    }

    fn purge_destroyed_weapons(&mut self) -> usize {
        let world = self.world;
        let mut removed = self.index.retain_live(world);
        removed += self.cache.retain_weapons(|w| world.weapon(w).is_some());
        removed += self.reservations.retain(|w, _| world.weapon(w).is_some());

        let dangling: Vec<WeaponId> = self
            .forced
            .agents()
            .into_iter()
            .filter_map(|agent| self.forced.forced_primary(agent).and_then(|f| f.weapon))
            .filter(|w| world.weapon(*w).is_none())
            .collect();
        for weapon in dangling {
            removed += self.forced.clear_weapon(weapon).len();
        }
        removed
    }

    fn purge_stale_jobs(&mut self) -> usize {
        let jobs = self.provenance.purge_stale(self.now, self.retention);
        for job in &jobs {
            self.reservations.release_job(*job);
        }
        if !jobs.is_empty() {
            tracing::debug!("Dropped {} jobs the host never finished", jobs.len());
        }
        let provenance = &*self.provenance;
        let orphaned = self.reservations.retain(|_, r| provenance.is_auto(r.job));
        jobs.len() + orphaned
    }
}

impl Maintainable for MaintenanceScope<'_> {
    fn run_cleanup(&mut self, target: CleanupTarget) -> usize {
        match target {
            CleanupTarget::ScoreCacheSweep => self.cache.sweep_expired(self.now),
            CleanupTarget::DeadAgentPurge => self.purge_dead_agents(),
            CleanupTarget::DestroyedWeaponPurge => self.purge_destroyed_weapons(),
            CleanupTarget::StaleJobPurge => self.purge_stale_jobs(),
            CleanupTarget::FailureExpiry => self.failures.purge_expired(self.now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoreError;
    use crate::host::MemoryWorld;
    use armory_events::{fixtures, AgentSnapshot, FailureReason, Position, WeaponSnapshot};

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

    fn engine(config: ArmoryConfig) -> ArmoryEngine {
        ArmoryEngine::new(config, Box::new(DamageOracle), Capabilities::neutral()).unwrap()
    }

    fn quiet_config() -> ArmoryConfig {
        let mut config = ArmoryConfig::default();
        config.sidearms.enabled = false;
        config.notifications.global_interval_ticks = 0;
        config.notifications.per_agent_interval_ticks = 0;
        config
    }

    fn world_with(colonists: &[u64], weapons: Vec<WeaponSnapshot>) -> MemoryWorld {
        let mut world = MemoryWorld::new();
        for id in colonists {
            world.insert_agent(fixtures::colonist(*id, Position::new(0, 0)));
        }
        for w in weapons {
            world.insert_weapon(w);
        }
        world
    }

    #[test]
    fn test_unarmed_agent_gets_job_without_expiry() {
        let world = world_with(
            &[1],
            vec![fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(3, 0))],
        );
        let mut engine = engine(quiet_config());

        let output = engine.tick(&world);
        assert_eq!(output.jobs.len(), 1);
        let job = &output.jobs[0];
        assert_eq!(job.agent, AgentId(1));
        assert_eq!(job.target_weapon, WeaponId(10));
        assert!(job.is_auto_generated);
        assert!(!job.is_forced);
        assert_eq!(job.expiry, None);
        assert!(engine.provenance().is_auto(job.job_id));
        assert_eq!(engine.reservations().holder(WeaponId(10)).unwrap().agent, AgentId(1));
    }

    #[test]
    fn test_one_weapon_two_agents_one_job() {
        let world = world_with(
            &[1, 2],
            vec![fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(3, 0))],
        );
        let mut engine = engine(quiet_config());

        let output = engine.tick(&world);
        assert_eq!(output.jobs.len(), 1);
        assert_eq!(engine.reservations().len(), 1);
    }

    #[test]
    fn test_job_success_notifies_and_releases() {
        let mut world = world_with(
            &[1],
            vec![fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(3, 0))],
        );
        let mut engine = engine(quiet_config());
        let job = engine.tick(&world).jobs.remove(0);

        world.tick = 40;
        engine.handle_event(
            &world,
            WorldEvent::EquipmentChanged {
                agent: AgentId(1),
                weapon: WeaponId(10),
                change: EquipmentChange::Equipped,
                slot: EquipSlot::Primary,
                job: Some(job.job_id),
                player_forced: false,
            },
        );
        engine.handle_event(
            &world,
            WorldEvent::JobEnded {
                job: job.job_id,
                outcome: JobOutcome::Succeeded,
            },
        );

        assert!(engine.forced().is_empty());
        assert!(engine.provenance().is_empty());
        assert!(engine.reservations().is_empty());
        assert!(!engine.index().contains(WeaponId(10)));

        world.tick = 41;
        let output = engine.tick(&world);
        assert_eq!(
            output.notifications,
            vec![Notification::Equipped {
                agent: AgentId(1),
                weapon: "Gun_Revolver".into(),
            }]
        );
    }

    #[test]
    fn test_player_forced_primary_blocks_evaluation() {
        let mut world = world_with(
            &[1],
            vec![fixtures::ranged(20, "Gun_Sniper", 50.0, Position::new(2, 0))],
        );
        let mut pistol = fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(0, 0));
        pistol.position = None;
        world.insert_weapon(pistol);
        world.agent_mut(AgentId(1)).unwrap().primary = Some(WeaponId(10));

        let mut engine = engine(quiet_config());
        engine.handle_event(
            &world,
            WorldEvent::EquipmentChanged {
                agent: AgentId(1),
                weapon: WeaponId(10),
                change: EquipmentChange::Equipped,
                slot: EquipSlot::Primary,
                job: None,
                player_forced: true,
            },
        );
        assert!(engine.forced().has_forced_primary(AgentId(1)));
        assert!(engine.tick(&world).jobs.is_empty());
        assert!(engine.evaluate_agent(&world, AgentId(1)).is_none());
    }

    #[test]
    fn test_forced_sidearm_recorded_by_def() {
        let mut world = world_with(&[1], Vec::new());
        let mut knife = fixtures::melee(30, "MeleeWeapon_Knife", 5.0, Position::new(0, 0));
        knife.position = None;
        world.insert_weapon(knife);
        world.agent_mut(AgentId(1)).unwrap().sidearms.push(WeaponId(30));

        let mut engine = engine(quiet_config());
        engine.handle_event(
            &world,
            WorldEvent::EquipmentChanged {
                agent: AgentId(1),
                weapon: WeaponId(30),
                change: EquipmentChange::Equipped,
                slot: EquipSlot::Sidearm { replaces: None },
                job: None,
                player_forced: true,
            },
        );
        assert!(engine
            .forced()
            .is_forced_def(AgentId(1), &"MeleeWeapon_Knife".into()));
        assert!(!engine.forced().has_forced_primary(AgentId(1)));
    }

    #[test]
    fn test_dropping_forced_primary_clears_it() {
        let mut world = world_with(&[1], Vec::new());
        let mut pistol = fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(0, 0));
        pistol.position = None;
        world.insert_weapon(pistol);
        world.agent_mut(AgentId(1)).unwrap().primary = Some(WeaponId(10));

        let mut engine = engine(quiet_config());
        let equipped = WorldEvent::EquipmentChanged {
            agent: AgentId(1),
            weapon: WeaponId(10),
            change: EquipmentChange::Equipped,
            slot: EquipSlot::Primary,
            job: None,
            player_forced: true,
        };
        engine.handle_event(&world, equipped);

        world.agent_mut(AgentId(1)).unwrap().primary = None;
        engine.handle_event(
            &world,
            WorldEvent::EquipmentChanged {
                agent: AgentId(1),
                weapon: WeaponId(10),
                change: EquipmentChange::Dropped,
                slot: EquipSlot::Primary,
                job: None,
                player_forced: false,
            },
        );
        assert!(!engine.forced().has_forced_primary(AgentId(1)));
        assert!(engine.schedule().is_due(AgentId(1), 0));
    }

    #[test]
    fn test_destroyed_target_releases_reservation() {
        let mut world = world_with(
            &[1],
            vec![fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(3, 0))],
        );
        let mut engine = engine(quiet_config());
        engine.tick(&world);
        assert_eq!(engine.reservations().len(), 1);

        world.remove_weapon(WeaponId(10));
        engine.handle_event(&world, WorldEvent::WeaponDestroyed { weapon: WeaponId(10) });
        assert!(engine.reservations().is_empty());
        assert!(!engine.index().contains(WeaponId(10)));
    }

    #[test]
    fn test_agent_destroyed_purges_everything() {
        let mut world = world_with(
            &[1],
            vec![fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(3, 0))],
        );
        let mut engine = engine(quiet_config());
        engine.tick(&world);
        assert_eq!(engine.provenance().len(), 1);

        world.remove_agent(AgentId(1));
        engine.handle_event(&world, WorldEvent::AgentDestroyed { agent: AgentId(1) });
        assert!(engine.provenance().is_empty());
        assert!(engine.reservations().is_empty());
        assert!(engine.schedule().is_empty());
        // Only the weapon-intrinsic tier survives
        assert_eq!(engine.cache().len(), 1);
    }

    #[test]
    fn test_repeated_failures_blacklist_def() {
        let mut world = world_with(
            &[1],
            vec![fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(3, 0))],
        );
        let mut config = quiet_config();
        config.failures.blacklist_threshold = 2;
        let mut engine = engine(config);

        let first = engine.tick(&world).jobs.remove(0);
        engine.handle_event(
            &world,
            WorldEvent::JobEnded {
                job: first.job_id,
                outcome: JobOutcome::Failed(FailureReason::Unreachable),
            },
        );

        world.tick = 10;
        let second = engine
            .evaluate_agent(&world, AgentId(1))
            .expect("one failure is not enough to blacklist");
        engine.handle_event(
            &world,
            WorldEvent::JobEnded {
                job: second.job_id,
                outcome: JobOutcome::Failed(FailureReason::Unreachable),
            },
        );

        assert!(engine
            .failures()
            .is_blacklisted(AgentId(1), &"Gun_Revolver".into(), world.tick));
        assert!(engine.evaluate_agent(&world, AgentId(1)).is_none());
    }

    #[test]
    fn test_think_tree_driver_stops_tick_evaluations() {
        let world = world_with(
            &[1],
            vec![fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(3, 0))],
        );
        let mut engine = engine(quiet_config());
        let mut tree = ThinkNode::with_children("root", vec![ThinkNode::new("job_giver_work")]);
        let driver = engine.install_think_tree(&mut tree, &InjectionRule::default());
        assert!(!driver.is_tick_driven());

        assert!(engine.tick(&world).jobs.is_empty());
        assert!(engine.evaluate_agent(&world, AgentId(1)).is_some());
    }

    #[test]
    fn test_disabled_engine_is_silent() {
        let world = world_with(
            &[1],
            vec![fixtures::ranged(10, "Gun_Revolver", 8.0, Position::new(3, 0))],
        );
        let mut config = quiet_config();
        config.general.enabled = false;
        let mut engine = engine(config);
        assert!(engine.tick(&world).jobs.is_empty());
        assert!(engine.evaluate_agent(&world, AgentId(1)).is_none());
    }

    #[test]
    fn test_save_data_version_checked() {
        let mut engine = engine(quiet_config());
        let mut data = SaveData::default();
        data.forced_primary.insert(AgentId(1), "Gun_Revolver".into());
        engine.load_save_data(&data, 0).unwrap();
        assert!(engine.forced().has_forced_primary(AgentId(1)));
        assert_eq!(engine.save_data(), data);

        data.version = SAVE_DATA_VERSION + 1;
        assert!(matches!(
            engine.load_save_data(&data, 0),
            Err(SaveDataError::UnsupportedVersion { .. })
        ));
        assert!(engine.load_save_json("not json", 0).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ArmoryConfig::default();
        config.index.capacity = 0;
        assert!(matches!(
            ArmoryEngine::new(config, Box::new(DamageOracle), Capabilities::neutral()),
            Err(ArmoryError::Config(_))
        ));
    }
}
