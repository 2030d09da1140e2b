//! Optional Capabilities
//!
//! Situational modifiers that depend on optional host integrations are
//! consumed through small capability traits. Each integration gets its own
//! adapter, chosen once when the engine is built; when an integration is
//! absent the neutral adapter answers with no-op results.

use armory_events::{AgentSnapshot, WeaponSnapshot};

use crate::config::ScoringConfig;
use crate::error::ScoreError;

/// Ammunition situation of an agent with respect to a weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmmoStatus {
    /// The weapon does not use ammunition, or no ammo system is active
    NotApplicable,
    Available,
    Missing,
}

/// Ammunition availability check.
pub trait AmmoCapability {
    /// Adapter name for diagnostics.
    fn name(&self) -> &'static str;

    fn ammo_status(
        &self,
        agent: &AgentSnapshot,
        weapon: &WeaponSnapshot,
    ) -> Result<AmmoStatus, ScoreError>;
}

/// Neutral adapter used when no ammunition system is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAmmoSystem;

impl AmmoCapability for NoAmmoSystem {
    fn name(&self) -> &'static str {
        "none"
    }

    fn ammo_status(
        &self,
        _agent: &AgentSnapshot,
        _weapon: &WeaponSnapshot,
    ) -> Result<AmmoStatus, ScoreError> {
        Ok(AmmoStatus::NotApplicable)
    }
}

/// Adapter that checks the ammunition an agent carries in its inventory.
#[derive(Debug, Clone, Copy)]
pub struct CarriedAmmo {
    /// Rounds required before the weapon counts as supplied
    pub min_rounds: u32,
}

impl AmmoCapability for CarriedAmmo {
    fn name(&self) -> &'static str {
        "carried_ammo"
    }

    fn ammo_status(
        &self,
        agent: &AgentSnapshot,
        weapon: &WeaponSnapshot,
    ) -> Result<AmmoStatus, ScoreError> {
        let Some(kind) = weapon.ammo_kind.as_deref() else {
            return Ok(AmmoStatus::NotApplicable);
        };
        if kind.is_empty() {
            return Err(ScoreError::Capability {
                capability: "carried_ammo",
                message: format!("{} declares an empty ammo kind", weapon.def),
            });
        }
        let rounds = agent.carried_ammo.get(kind).copied().unwrap_or(0);
        if rounds >= self.min_rounds {
            Ok(AmmoStatus::Available)
        } else {
            Ok(AmmoStatus::Missing)
        }
    }
}

/// Capability adapters resolved for this engine instance.
pub struct Capabilities {
    pub ammo: Box<dyn AmmoCapability>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("ammo", &self.ammo.name())
            .finish()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Capabilities {
    /// All capabilities answer with neutral results.
    pub fn neutral() -> Self {
        Self {
            ammo: Box::new(NoAmmoSystem),
        }
    }

    /// Picks adapters from config and what the host reports it supports.
    pub fn resolve(config: &ScoringConfig, host_supports_ammo: bool) -> Self {
        let ammo: Box<dyn AmmoCapability> = if config.consult_ammo && host_supports_ammo {
            Box::new(CarriedAmmo {
                min_rounds: config.min_ammo_rounds,
            })
        } else {
            Box::new(NoAmmoSystem)
        };
        tracing::info!("Resolved ammo capability: {}", ammo.name());
        Self { ammo }
    }
}
