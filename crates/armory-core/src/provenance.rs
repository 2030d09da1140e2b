//! Job provenance and weapon reservations.
//!
//! Every job the engine emits is recorded here until the host reports it
//! finished. The record is what tells an equip event triggered by one of
//! our jobs apart from a player's direct order, and it carries the previous
//! weapon so completion can be reported as an upgrade.
//!
//! Reservations keep two agents from racing for the same weapon: a weapon
//! is claimed the moment a job targeting it is emitted.

use std::collections::HashMap;

use armory_events::{AgentId, EquipSlot, JobId, Tick, WeaponDefId, WeaponId};

/// Metadata about one engine-issued job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceRecord {
    pub agent: AgentId,
    pub weapon: WeaponId,
    pub def: WeaponDefId,
    /// Def the agent held in the targeted slot when the job was issued
    pub previous_def: Option<WeaponDefId>,
    pub slot: EquipSlot,
    pub issued_at: Tick,
}

/// In-flight jobs issued by the engine.
#[derive(Debug, Default)]
pub struct ProvenanceTracker {
    records: HashMap<JobId, ProvenanceRecord>,
    by_agent: HashMap<AgentId, JobId>,
}

impl ProvenanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn register(&mut self, job: JobId, record: ProvenanceRecord) {
        if let Some(previous) = self.by_agent.insert(record.agent, job) {
            if previous != job {
                tracing::debug!(
                    "{} already had {} in flight; superseded by {}",
                    record.agent,
                    previous,
                    job
                );
                self.records.remove(&previous);
            }
        }
        self.records.insert(job, record);
    }

    /// True when `job` was issued by the engine and has not finished yet.
    pub fn is_auto(&self, job: JobId) -> bool {
        self.records.contains_key(&job)
    }

    pub fn get(&self, job: JobId) -> Option<&ProvenanceRecord> {
        self.records.get(&job)
    }

    /// The agent's in-flight engine job, if any.
    pub fn in_flight_for(&self, agent: AgentId) -> Option<JobId> {
        self.by_agent.get(&agent).copied()
    }

    /// Removes and returns the record of a finished job.
    pub fn take(&mut self, job: JobId) -> Option<ProvenanceRecord> {
        let record = self.records.remove(&job)?;
        if self.by_agent.get(&record.agent) == Some(&job) {
            self.by_agent.remove(&record.agent);
        }
        Some(record)
    }

    /// Drops every record for an agent. Returns the jobs removed.
    pub fn purge_agent(&mut self, agent: AgentId) -> Vec<JobId> {
        self.by_agent.remove(&agent);
        let jobs: Vec<JobId> = self
            .records
            .iter()
            .filter(|(_, r)| r.agent == agent)
            .map(|(job, _)| *job)
            .collect();
        for job in &jobs {
            self.records.remove(job);
        }
        jobs
    }

    /// Drops records older than `retention` ticks, whose end the host never reported.
    pub fn purge_stale(&mut self, now: Tick, retention: u64) -> Vec<JobId> {
        self.purge_where(|r| now.saturating_sub(r.issued_at) > retention)
    }

    /// Drops records whose agent fails `alive`.
    pub fn retain_agents(&mut self, alive: impl Fn(AgentId) -> bool) -> Vec<JobId> {
        self.purge_where(|r| !alive(r.agent))
    }

    fn purge_where(&mut self, stale: impl Fn(&ProvenanceRecord) -> bool) -> Vec<JobId> {
        let jobs: Vec<JobId> = self
            .records
            .iter()
            .filter(|(_, r)| stale(r))
            .map(|(job, _)| *job)
            .collect();
        for job in &jobs {
            self.take(*job);
        }
        jobs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub agent: AgentId,
    pub job: JobId,
}

/// Weapons currently targeted by an in-flight engine job.
#[derive(Debug, Default)]
pub struct ReservationSet {
    by_weapon: HashMap<WeaponId, Reservation>,
}

impl ReservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_weapon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_weapon.is_empty()
    }

    pub fn holder(&self, weapon: WeaponId) -> Option<Reservation> {
        self.by_weapon.get(&weapon).copied()
    }

    /// Claims `weapon` for `agent`. Fails if another agent holds it.
    pub fn claim(&mut self, weapon: WeaponId, agent: AgentId, job: JobId) -> bool {
        match self.by_weapon.get(&weapon) {
            Some(existing) if existing.agent != agent => false,
            _ => {
                self.by_weapon.insert(weapon, Reservation { agent, job });
                true
            }
        }
    }

    /// True when another agent's job targets `weapon`.
    pub fn is_reserved_by_other(&self, weapon: WeaponId, agent: AgentId) -> bool {
        self.by_weapon
            .get(&weapon)
            .is_some_and(|r| r.agent != agent)
    }

    pub fn release_weapon(&mut self, weapon: WeaponId) -> bool {
        self.by_weapon.remove(&weapon).is_some()
    }

    pub fn release_job(&mut self, job: JobId) -> usize {
        self.retain(|_, r| r.job != job)
    }

    pub fn release_agent(&mut self, agent: AgentId) -> usize {
        self.retain(|_, r| r.agent != agent)
    }

    /// Keeps reservations passing `keep`. Returns the number released.
    pub fn retain(&mut self, mut keep: impl FnMut(WeaponId, &Reservation) -> bool) -> usize {
        let before = self.by_weapon.len();
        self.by_weapon.retain(|weapon, r| keep(*weapon, r));
        before - self.by_weapon.len()
    }
}
