//! Error types.
//!
//! Every error here is recovered inside the engine; none of them reach the
//! host as a hard failure. They exist so the recovering code can log what
//! went wrong and pick the safe default.

use armory_events::{WeaponDefId, WeaponId};
use thiserror::Error;

use crate::config::ConfigError;

/// Fault raised by a scoring oracle for a single (agent, weapon) pair.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// A stat the oracle needs is missing or out of its valid domain
    #[error("invalid stat `{stat}` on {def}: {value}")]
    InvalidStat {
        def: WeaponDefId,
        stat: &'static str,
        value: f32,
    },
    /// The oracle produced NaN or an infinite score
    #[error("non-finite score for {0}")]
    NonFinite(WeaponDefId),
    /// An optional capability the oracle consulted failed
    #[error("capability `{capability}` failed: {message}")]
    Capability {
        capability: &'static str,
        message: String,
    },
}

/// Fault raised while indexing a single weapon.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The weapon is not lying on the map
    #[error("{0} is not spawned")]
    NotSpawned(WeaponId),
    /// The weapon's stats cannot be categorised
    #[error("{0} has non-finite stats")]
    NonFiniteStats(WeaponId),
    /// The host enumerated an id it cannot resolve
    #[error("{0} is not known to the world")]
    Unknown(WeaponId),
}

/// Errors while encoding or decoding persisted state.
#[derive(Debug, Error)]
pub enum SaveDataError {
    #[error("save data json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported save data version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Errors that can occur when constructing or driving the engine.
#[derive(Debug, Error)]
pub enum ArmoryError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("save data error: {0}")]
    SaveData(#[from] SaveDataError),
}
