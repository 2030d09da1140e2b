//! Candidate Search
//!
//! Turns an agent's position into a bounded, distance-ordered list of weapons
//! worth scoring. The radius starts small and doubles while too few usable
//! candidates turn up, capped by a larger limit for unarmed agents. The list
//! size shrinks as the colony grows so total work per tick stays flat.
//!
//! Results are copied out of the index, so later index mutations in the
//! same tick cannot disturb an evaluation that is still walking the list.

use armory_events::{AgentSnapshot, WeaponDefId, WeaponId, WeaponSnapshot};

use crate::config::SearchConfig;
use crate::host::WorldView;
use crate::spatial::SpatialWeaponIndex;

/// A weapon worth scoring for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub weapon: WeaponId,
    pub def: WeaponDefId,
    pub distance_sq: i64,
}

/// Candidates and the radius at which the search settled.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub candidates: Vec<Candidate>,
    pub radius: f32,
    pub expansions: u32,
}

#[derive(Debug, Clone)]
pub struct CandidateSearch {
    config: SearchConfig,
}

impl CandidateSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Maximum candidates returned for a colony of the given size.
    pub fn candidate_limit(&self, colonists: usize) -> usize {
        let full = self.config.max_candidates;
        let limit = if colonists <= self.config.large_colony_size {
            full
        } else if colonists <= self.config.huge_colony_size {
            full * 3 / 4
        } else {
            full / 2
        };
        limit.max(1)
    }

    /// Largest radius the search may expand to for this agent.
    pub fn max_radius_for(&self, agent: &AgentSnapshot) -> f32 {
        if agent.is_unarmed() {
            self.config.unarmed_radius.max(self.config.max_radius)
        } else {
            self.config.max_radius
        }
    }

    /// Searches around `agent` for weapons passing `accept`.
    ///
    /// Weapons the agent already carries, weapons no longer on the map,
    /// forbidden weapons and weapons the agent's outfit disallows are always
    /// skipped. `accept` adds caller-specific exclusions such as reservations,
    /// blacklists and unusable scores. Only accepted weapons count towards
    /// `min_candidates`.
    pub fn search<F>(
        &self,
        index: &SpatialWeaponIndex,
        world: &dyn WorldView,
        agent: &AgentSnapshot,
        mut accept: F,
    ) -> SearchResult
    where
        F: FnMut(&WeaponSnapshot) -> bool,
    {
        let Some(origin) = agent.position else {
            return SearchResult::default();
        };

        let limit = self.candidate_limit(world.colonist_count());
        let max_radius = self.max_radius_for(agent);
        let mut radius = self.config.initial_radius.min(max_radius);
        let mut expansions = 0;

        loop {
            // Over-fetch so filtered weapons do not starve the result
            let nearby =
                index.query_near(origin, radius, self.config.sufficient_count, limit * 2);

            let mut candidates: Vec<Candidate> = nearby
                .into_iter()
                .filter_map(|near| {
                    let weapon = world.weapon(near.id)?;
                    let usable = weapon.is_spawned_weapon()
                        && !weapon.forbidden
                        && !agent.carries(weapon.id)
                        && agent.outfit.allows(&weapon.def)
                        && accept(weapon);
                    usable.then(|| Candidate {
                        weapon: weapon.id,
                        def: weapon.def.clone(),
                        distance_sq: near.distance_sq,
                    })
                })
                .collect();

            if candidates.len() >= self.config.min_candidates || radius >= max_radius {
                candidates.truncate(limit);
                tracing::trace!(
                    "{}: {} candidates within {} after {} expansions",
                    agent.id,
                    candidates.len(),
                    radius,
                    expansions
                );
                return SearchResult {
                    candidates,
                    radius,
                    expansions,
                };
            }

            radius = (radius * 2.0).min(max_radius);
            expansions += 1;
        }
    }
}
