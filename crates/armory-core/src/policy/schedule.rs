//! Evaluation Schedule
//!
//! Decides when each agent is evaluated next. Intervals grow with colony
//! size so the total evaluation work per tick stays roughly constant, and a
//! seeded jitter spreads agents out so they do not all come due together.

use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use armory_events::{AgentId, Tick};

use crate::config::ScheduleConfig;

#[derive(Debug)]
pub struct EvaluationSchedule {
    config: ScheduleConfig,
    rng: SmallRng,
    next_due: HashMap<AgentId, Tick>,
}

impl EvaluationSchedule {
    pub fn new(config: &ScheduleConfig, seed: u64) -> Self {
        Self {
            config: config.clone(),
            rng: SmallRng::seed_from_u64(seed),
            next_due: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.next_due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_due.is_empty()
    }

    /// Interval before jitter.
    ///
    /// Unarmed agents use the short unarmed interval regardless of colony size.
    pub fn base_interval(&self, colonists: usize, unarmed: bool) -> u64 {
        if unarmed {
            return self.config.unarmed_interval_ticks;
        }
        let excess = colonists.saturating_sub(self.config.population_baseline) as f64;
        let scale = 1.0 + self.config.per_colonist_scale.max(0.0) as f64 * excess;
        let interval = (self.config.base_interval_ticks as f64 * scale).round() as u64;
        interval.min(self.config.max_interval_ticks.max(self.config.base_interval_ticks))
    }

    /// True when the agent has never been scheduled or its due tick has passed.
    pub fn is_due(&self, agent: AgentId, now: Tick) -> bool {
        self.next_due.get(&agent).map_or(true, |due| *due <= now)
    }

    pub fn next_due(&self, agent: AgentId) -> Option<Tick> {
        self.next_due.get(&agent).copied()
    }

    /// Due agents among `agents`, most overdue first.
    pub fn due_agents(&self, agents: &[AgentId], now: Tick) -> Vec<AgentId> {
        let mut due: Vec<(Tick, AgentId)> = agents
            .iter()
            .filter(|a| self.is_due(**a, now))
            .map(|a| (self.next_due.get(a).copied().unwrap_or(0), *a))
            .collect();
        due.sort();
        due.into_iter().map(|(_, a)| a).collect()
    }

    /// Schedules the agent's next evaluation and returns its due tick.
    pub fn schedule_next(
        &mut self,
        agent: AgentId,
        now: Tick,
        colonists: usize,
        unarmed: bool,
    ) -> Tick {
        let base = self.base_interval(colonists, unarmed) as f64;
        let jitter = self.config.jitter_fraction.clamp(0.0, 0.9) as f64;
        let factor = if jitter > 0.0 {
            self.rng.gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };
        let interval = ((base * factor).round() as u64).max(1);
        let due = now + interval;
        self.next_due.insert(agent, due);
        due
    }

    /// Makes the agent due on the next tick.
    pub fn request_immediate(&mut self, agent: AgentId) {
        self.next_due.insert(agent, 0);
    }

    pub fn forget(&mut self, agent: AgentId) -> bool {
        self.next_due.remove(&agent).is_some()
    }

    pub fn retain_agents(&mut self, alive: impl Fn(AgentId) -> bool) -> usize {
        let before = self.next_due.len();
        self.next_due.retain(|agent, _| alive(*agent));
        before - self.next_due.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScheduleConfig {
        ScheduleConfig {
            base_interval_ticks: 100,
            unarmed_interval_ticks: 20,
            population_baseline: 10,
            per_colonist_scale: 0.1,
            max_interval_ticks: 300,
            jitter_fraction: 0.2,
        }
    }

    #[test]
    fn test_interval_scales_with_population() {
        let schedule = EvaluationSchedule::new(&config(), 1);
        assert_eq!(schedule.base_interval(5, false), 100);
        assert_eq!(schedule.base_interval(10, false), 100);
        assert_eq!(schedule.base_interval(20, false), 200);
        assert_eq!(schedule.base_interval(100, false), 300);
        assert_eq!(schedule.base_interval(100, true), 20);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let mut schedule = EvaluationSchedule::new(&config(), 7);
        for i in 0..200 {
            let due = schedule.schedule_next(AgentId(i), 1000, 5, false);
            assert!((1080..=1120).contains(&due), "due {} out of range", due);
        }
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let mut a = EvaluationSchedule::new(&config(), 42);
        let mut b = EvaluationSchedule::new(&config(), 42);
        for i in 0..20 {
            assert_eq!(
                a.schedule_next(AgentId(i), 0, 15, false),
                b.schedule_next(AgentId(i), 0, 15, false)
            );
        }
    }

    #[test]
    fn test_due_agents() {
        let mut schedule = EvaluationSchedule::new(
            &ScheduleConfig {
                jitter_fraction: 0.0,
                ..config()
            },
            1,
        );
        let agents = [AgentId(1), AgentId(2), AgentId(3)];

        // Never-scheduled agents are due immediately
        assert_eq!(schedule.due_agents(&agents, 0), agents.to_vec());

        schedule.schedule_next(AgentId(1), 0, 1, false);
        schedule.schedule_next(AgentId(2), 0, 1, true);
        schedule.schedule_next(AgentId(3), 0, 1, false);
        assert!(schedule.due_agents(&agents, 19).is_empty());
        assert_eq!(schedule.due_agents(&agents, 20), vec![AgentId(2)]);

        schedule.request_immediate(AgentId(3));
        assert_eq!(schedule.due_agents(&agents, 50), vec![AgentId(3), AgentId(2)]);
    }

    #[test]
    fn test_forget_and_retain() {
        let mut schedule = EvaluationSchedule::new(&config(), 1);
        schedule.schedule_next(AgentId(1), 0, 1, false);
        schedule.schedule_next(AgentId(2), 0, 1, false);
        assert!(schedule.forget(AgentId(1)));
        assert!(!schedule.forget(AgentId(1)));
        assert_eq!(schedule.retain_agents(|_| false), 1);
        assert!(schedule.is_empty());
    }
}
