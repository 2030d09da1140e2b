//! Rate-limited user notifications.

use std::collections::HashMap;

use armory_events::{AgentId, Notification, Tick};

use crate::config::NotificationConfig;

#[derive(Debug)]
pub struct Notifier {
    enabled: bool,
    per_agent_interval: u64,
    global_interval: u64,
    last_global: Option<Tick>,
    last_by_agent: HashMap<AgentId, Tick>,
    suppressed: u64,
}

impl Notifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
            per_agent_interval: config.per_agent_interval_ticks,
            global_interval: config.global_interval_ticks,
            last_global: None,
            last_by_agent: HashMap::new(),
            suppressed: 0,
        }
    }

    /// Notifications dropped by the rate limits so far.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn len(&self) -> usize {
        self.last_by_agent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_by_agent.is_empty()
    }

    /// Passes the notification through unless a rate limit applies.
    pub fn offer(&mut self, notification: Notification, now: Tick) -> Option<Notification> {
        if !self.enabled {
            return None;
        }
        let agent = notification.agent();
        let global_ok = self
            .last_global
            .map_or(true, |last| now.saturating_sub(last) >= self.global_interval);
        let agent_ok = self
            .last_by_agent
            .get(&agent)
            .map_or(true, |last| now.saturating_sub(*last) >= self.per_agent_interval);

        if !(global_ok && agent_ok) {
            self.suppressed += 1;
            tracing::trace!("Suppressed notification for {}", agent);
            return None;
        }
        self.last_global = Some(now);
        self.last_by_agent.insert(agent, now);
        Some(notification)
    }

    pub fn retain_agents(&mut self, alive: impl Fn(AgentId) -> bool) -> usize {
        let before = self.last_by_agent.len();
        self.last_by_agent.retain(|agent, _| alive(*agent));
        before - self.last_by_agent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armory_events::WeaponDefId;

    fn equipped(agent: u64) -> Notification {
        Notification::Equipped {
            agent: AgentId(agent),
            weapon: WeaponDefId::from("Gun_Rifle"),
        }
    }

    fn notifier() -> Notifier {
        Notifier::new(&NotificationConfig {
            enabled: true,
            per_agent_interval_ticks: 1000,
            global_interval_ticks: 100,
        })
    }

    #[test]
    fn test_global_and_per_agent_limits() {
        let mut n = notifier();
        assert!(n.offer(equipped(1), 0).is_some());
        // Global limit
        assert!(n.offer(equipped(2), 50).is_none());
        assert!(n.offer(equipped(2), 100).is_some());
        // Per-agent limit
        assert!(n.offer(equipped(1), 500).is_none());
        assert!(n.offer(equipped(1), 1000).is_some());
        assert_eq!(n.suppressed(), 2);
    }

    #[test]
    fn test_disabled_notifier_is_silent() {
        let mut n = Notifier::new(&NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        });
        assert!(n.offer(equipped(1), 0).is_none());
    }

    #[test]
    fn test_retain_agents() {
        let mut n = notifier();
        n.offer(equipped(1), 0);
        n.offer(equipped(2), 200);
        assert_eq!(n.retain_agents(|a| a == AgentId(1)), 1);
        assert_eq!(n.len(), 1);
    }
}
