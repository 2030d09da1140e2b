//! Repeated-failure tracking.
//!
//! Counts failed equip attempts per (agent, weapon def). Once the count
//! reaches the threshold the def is blacklisted for that agent for a
//! bounded time. Failures caused by a temporary body state are not counted.

use std::collections::HashMap;

use armory_events::{AgentId, FailureReason, Tick, WeaponDefId};

use crate::config::FailureConfig;

#[derive(Debug, Clone)]
struct FailureRecord {
    count: u32,
    last_failure: Tick,
    blacklisted_until: Option<Tick>,
}

/// What recording a failure did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Temporary restriction; not counted
    Ignored,
    Counted(u32),
    Blacklisted { until: Tick },
}

#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    duration: u64,
    forget_after: u64,
    records: HashMap<(AgentId, WeaponDefId), FailureRecord>,
}

impl FailureTracker {
    pub fn new(config: &FailureConfig) -> Self {
        Self {
            threshold: config.blacklist_threshold.max(1),
            duration: config.blacklist_duration_ticks,
            forget_after: config.forget_after_ticks,
            records: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failure_count(&self, agent: AgentId, def: &WeaponDefId) -> u32 {
        self.records
            .get(&(agent, def.clone()))
            .map(|r| r.count)
            .unwrap_or(0)
    }

    pub fn record_failure(
        &mut self,
        agent: AgentId,
        def: &WeaponDefId,
        reason: FailureReason,
        now: Tick,
    ) -> FailureVerdict {
        if reason.is_temporary() {
            tracing::debug!(
                "{} could not equip {} ({:?}); restriction may lift, not counted",
                agent,
                def,
                reason
            );
            return FailureVerdict::Ignored;
        }

        let record = self
            .records
            .entry((agent, def.clone()))
            .or_insert(FailureRecord {
                count: 0,
                last_failure: now,
                blacklisted_until: None,
            });

        // A lapsed blacklist starts a fresh count
        if record.blacklisted_until.is_some_and(|until| until <= now) {
            record.blacklisted_until = None;
            record.count = 0;
        }

        record.count += 1;
        record.last_failure = now;
        let count = record.count;

        if count >= self.threshold {
            let until = now + self.duration;
            record.blacklisted_until = Some(until);
            tracing::warn!(
                "{} failed to equip {} {} times ({:?}); blacklisted until tick {}",
                agent,
                def,
                count,
                reason,
                until
            );
            return FailureVerdict::Blacklisted { until };
        }

        if count == 1 {
            tracing::debug!("{} failed to equip {} ({:?})", agent, def, reason);
        } else {
            tracing::info!(
                "{} failed to equip {} {} times ({:?})",
                agent,
                def,
                count,
                reason
            );
        }
        FailureVerdict::Counted(count)
    }

    /// A successful equip clears the record.
    pub fn record_success(&mut self, agent: AgentId, def: &WeaponDefId) {
        self.records.remove(&(agent, def.clone()));
    }

    pub fn is_blacklisted(&self, agent: AgentId, def: &WeaponDefId, now: Tick) -> bool {
        self.records
            .get(&(agent, def.clone()))
            .and_then(|r| r.blacklisted_until)
            .is_some_and(|until| now < until)
    }

    /// Forgets lapsed blacklists and idle failure counts. Returns the number removed.
    pub fn purge_expired(&mut self, now: Tick) -> usize {
        let before = self.records.len();
        let forget_after = self.forget_after;
        self.records.retain(|_, r| match r.blacklisted_until {
            Some(until) => now < until,
            None => now.saturating_sub(r.last_failure) < forget_after,
        });
        before - self.records.len()
    }

    pub fn purge_agent(&mut self, agent: AgentId) -> usize {
        self.retain_agents(|a| a != agent)
    }

    pub fn retain_agents(&mut self, alive: impl Fn(AgentId) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|(agent, _), _| alive(*agent));
        before - self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> FailureTracker {
        FailureTracker::new(&FailureConfig {
            blacklist_threshold: 3,
            blacklist_duration_ticks: 1000,
            forget_after_ticks: 5000,
        })
    }

    #[test]
    fn test_blacklist_after_threshold() {
        let mut tracker = tracker();
        let def = WeaponDefId::from("Gun_Minigun");
        let agent = AgentId(1);

        assert_eq!(
            tracker.record_failure(agent, &def, FailureReason::Restricted, 10),
            FailureVerdict::Counted(1)
        );
        tracker.record_failure(agent, &def, FailureReason::Unreachable, 20);
        assert!(!tracker.is_blacklisted(agent, &def, 20));

        assert_eq!(
            tracker.record_failure(agent, &def, FailureReason::Restricted, 30),
            FailureVerdict::Blacklisted { until: 1030 }
        );
        assert!(tracker.is_blacklisted(agent, &def, 30));
        assert!(!tracker.is_blacklisted(AgentId(2), &def, 30));
    }

    #[test]
    fn test_blacklist_expires() {
        let mut tracker = tracker();
        let def = WeaponDefId::from("Gun_Minigun");
        let agent = AgentId(1);
        for t in 0..3 {
            tracker.record_failure(agent, &def, FailureReason::Restricted, t);
        }
        assert!(tracker.is_blacklisted(agent, &def, 1001));
        assert!(!tracker.is_blacklisted(agent, &def, 1002));

        // Count starts over after the blacklist lapses
        assert_eq!(
            tracker.record_failure(agent, &def, FailureReason::Restricted, 1100),
            FailureVerdict::Counted(1)
        );
    }

    #[test]
    fn test_temporary_restriction_not_counted() {
        let mut tracker = tracker();
        let def = WeaponDefId::from("Gun_Rifle");
        for t in 0..10 {
            assert_eq!(
                tracker.record_failure(AgentId(1), &def, FailureReason::TemporarilyRestricted, t),
                FailureVerdict::Ignored
            );
        }
        assert!(!tracker.is_blacklisted(AgentId(1), &def, 10));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_success_clears_count() {
        let mut tracker = tracker();
        let def = WeaponDefId::from("Gun_Rifle");
        tracker.record_failure(AgentId(1), &def, FailureReason::Unreachable, 0);
        tracker.record_failure(AgentId(1), &def, FailureReason::Unreachable, 1);
        tracker.record_success(AgentId(1), &def);
        assert_eq!(tracker.failure_count(AgentId(1), &def), 0);
    }

    #[test]
    fn test_purge_expired() {
        let mut tracker = tracker();
        let def = WeaponDefId::from("Gun_Rifle");
        tracker.record_failure(AgentId(1), &def, FailureReason::Unreachable, 0);
        for t in 0..3 {
            tracker.record_failure(AgentId(2), &def, FailureReason::Restricted, t);
        }

        assert_eq!(tracker.purge_expired(100), 0);
        // Blacklist lapsed at 1002
        assert_eq!(tracker.purge_expired(2000), 1);
        // Idle count forgotten after 5000 ticks
        assert_eq!(tracker.purge_expired(5000), 1);
        assert!(tracker.is_empty());
    }
}
