//! Staggered Maintenance
//!
//! Bounds the memory of every cache and tracker without paying for all of
//! the cleanup at once. Each step runs a fixed number of cleanup targets,
//! walking the ordered target list round-robin, so the whole list is
//! covered every [`StaggeredMaintenance::cycle_length`] steps.
//!
//! The component only schedules; the cleanup itself is done by whoever
//! implements [`Maintainable`].

use crate::config::MaintenanceConfig;

/// One cleanup sub-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupTarget {
    /// Expired and invalidated score cache entries
    ScoreCacheSweep,
    /// Records of agents the world no longer has
    DeadAgentPurge,
    /// Index and cache entries of weapons the world no longer has
    DestroyedWeaponPurge,
    /// Provenance and reservations of jobs the host never finished
    StaleJobPurge,
    /// Lapsed blacklists and idle failure counts
    FailureExpiry,
}

impl CleanupTarget {
    pub const ALL: [CleanupTarget; 5] = [
        CleanupTarget::ScoreCacheSweep,
        CleanupTarget::DeadAgentPurge,
        CleanupTarget::DestroyedWeaponPurge,
        CleanupTarget::StaleJobPurge,
        CleanupTarget::FailureExpiry,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CleanupTarget::ScoreCacheSweep => "score_cache_sweep",
            CleanupTarget::DeadAgentPurge => "dead_agent_purge",
            CleanupTarget::DestroyedWeaponPurge => "destroyed_weapon_purge",
            CleanupTarget::StaleJobPurge => "stale_job_purge",
            CleanupTarget::FailureExpiry => "failure_expiry",
        }
    }

    fn position(self) -> usize {
        CleanupTarget::ALL
            .iter()
            .position(|t| *t == self)
            .unwrap_or(0)
    }
}

/// State that can be cleaned up target by target.
pub trait Maintainable {
    /// Runs one cleanup target and returns the number of entries removed.
    fn run_cleanup(&mut self, target: CleanupTarget) -> usize;
}

/// What one maintenance step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub ran: Vec<(CleanupTarget, usize)>,
    pub removed: usize,
    /// True when this step finished a pass over every target
    pub cycle_completed: bool,
}

#[derive(Debug)]
pub struct StaggeredMaintenance {
    ops_per_tick: usize,
    leak_threshold: usize,
    cursor: usize,
    cycle_removed: usize,
    total_removed: u64,
    cycles_completed: u64,
    leak_warnings: u64,
    invocations: [u64; CleanupTarget::ALL.len()],
}

impl StaggeredMaintenance {
    pub fn new(config: &MaintenanceConfig) -> Self {
        Self {
            ops_per_tick: config.ops_per_tick.clamp(1, CleanupTarget::ALL.len()),
            leak_threshold: config.leak_warning_threshold,
            cursor: 0,
            cycle_removed: 0,
            total_removed: 0,
            cycles_completed: 0,
            leak_warnings: 0,
            invocations: [0; CleanupTarget::ALL.len()],
        }
    }

    /// Steps needed to run every target once.
    pub fn cycle_length(&self) -> usize {
        CleanupTarget::ALL.len().div_ceil(self.ops_per_tick)
    }

    pub fn invocations(&self, target: CleanupTarget) -> u64 {
        self.invocations[target.position()]
    }

    pub fn total_removed(&self) -> u64 {
        self.total_removed
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Cycles whose removals exceeded the leak warning threshold.
    pub fn leak_warnings(&self) -> u64 {
        self.leak_warnings
    }

    /// Runs the next few cleanup targets.
    pub fn tick(&mut self, state: &mut dyn Maintainable) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        for _ in 0..self.ops_per_tick {
            let target = CleanupTarget::ALL[self.cursor];
            let removed = state.run_cleanup(target);
            self.invocations[self.cursor] += 1;
            report.ran.push((target, removed));
            report.removed += removed;
            if removed > 0 {
                tracing::debug!("Maintenance {}: removed {}", target.name(), removed);
            }

            self.cursor += 1;
            if self.cursor == CleanupTarget::ALL.len() {
                self.cursor = 0;
                self.finish_cycle(self.cycle_removed + report.removed);
                report.cycle_completed = true;
                self.cycle_removed = 0;
                self.total_removed += report.removed as u64;
                return report;
            }
        }

        self.cycle_removed += report.removed;
        self.total_removed += report.removed as u64;
        report
    }

    fn finish_cycle(&mut self, removed: usize) {
        self.cycles_completed += 1;
        if removed > self.leak_threshold {
            self.leak_warnings += 1;
            tracing::warn!(
                "Maintenance cycle removed {} entries (threshold {}); something upstream may be leaking",
                removed,
                self.leak_threshold
            );
        } else {
            tracing::trace!("Maintenance cycle removed {} entries", removed);
        }
    }
}
