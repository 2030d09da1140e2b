//! Interruption Policy
//!
//! Decides whether an equip job may interrupt the activity an agent is
//! currently performing. Which job classes count as critical, high, medium
//! or low priority is product policy, so the classification is plain data
//! loaded from the `[interruption]` config section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use armory_events::CurrentJob;

/// How important the agent's current activity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCriticality {
    /// Never interrupted, not even for an unarmed agent
    Critical,
    /// Interrupted only for large upgrades
    High,
    /// Interrupted for moderate upgrades
    Medium,
    /// Idle-like activity, always interruptible
    Low,
}

/// Why the engine wants to equip something.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Urgency {
    /// The agent holds no weapon at all
    Unarmed,
    /// The agent is armed and a candidate cleared the upgrade threshold
    Upgrade { ratio: f32 },
}

/// Outcome of the interruption check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptDecision {
    /// The agent is not doing anything; issue the job without interrupting
    Idle,
    /// Issue the job and interrupt the current activity
    Interrupt,
    /// Leave the agent alone this cycle
    Blocked(JobCriticality),
}

impl InterruptDecision {
    pub fn allows_job(&self) -> bool {
        !matches!(self, InterruptDecision::Blocked(_))
    }
}

/// Job-class classification and the ratio bars for interrupting each class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptionTable {
    /// Upgrade ratio required to interrupt medium-priority work
    pub medium_ratio: f32,
    /// Upgrade ratio required to interrupt high-priority work
    pub high_ratio: f32,
    /// Criticality of job classes not listed in `classes`
    pub default_criticality: JobCriticality,
    /// Job class name to criticality
    pub classes: BTreeMap<String, JobCriticality>,
}

impl Default for InterruptionTable {
    fn default() -> Self {
        let mut classes = BTreeMap::new();
        for class in [
            "extinguish_self",
            "flee",
            "flee_and_cower",
            "tend_patient_emergency",
            "rescue",
            "beat_fire",
            "attack_melee",
            "attack_static",
            "wait_combat",
            "equip",
        ] {
            classes.insert(class.to_string(), JobCriticality::Critical);
        }
        for class in ["tend_patient", "feed_patient", "capture", "operate", "haul_to_safety"] {
            classes.insert(class.to_string(), JobCriticality::High);
        }
        for class in ["construct", "mine", "cook", "research", "sow", "harvest", "repair"] {
            classes.insert(class.to_string(), JobCriticality::Medium);
        }
        for class in ["wander", "idle", "wait", "goto_wander", "socialize", "relax", "clean"] {
            classes.insert(class.to_string(), JobCriticality::Low);
        }

        Self {
            medium_ratio: 1.10,
            high_ratio: 1.20,
            default_criticality: JobCriticality::Medium,
            classes,
        }
    }
}

impl InterruptionTable {
    /// Criticality of a job class, falling back to the default for unlisted classes.
    pub fn classify(&self, class: &str) -> JobCriticality {
        self.classes
            .get(class)
            .copied()
            .unwrap_or(self.default_criticality)
    }

    /// Decides whether a job may be issued given what the agent is doing now.
    pub fn decide(&self, current: Option<&CurrentJob>, urgency: Urgency) -> InterruptDecision {
        let Some(job) = current else {
            return InterruptDecision::Idle;
        };

        let criticality = self.classify(&job.class);
        match (criticality, urgency) {
            (JobCriticality::Critical, _) => InterruptDecision::Blocked(criticality),
            (_, Urgency::Unarmed) => InterruptDecision::Interrupt,
            (JobCriticality::Low, Urgency::Upgrade { .. }) => InterruptDecision::Interrupt,
            (JobCriticality::Medium, Urgency::Upgrade { ratio }) if ratio >= self.medium_ratio => {
                InterruptDecision::Interrupt
            }
            (JobCriticality::High, Urgency::Upgrade { ratio }) if ratio >= self.high_ratio => {
                InterruptDecision::Interrupt
            }
            _ => InterruptDecision::Blocked(criticality),
        }
    }
}
