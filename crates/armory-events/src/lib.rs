//! Shared data types for the weapon evaluation engine.
//!
//! This crate contains pure data structures with no engine logic: stable
//! identities, snapshots of weapons and agents as exposed by the host
//! simulation, inbound world events, outbound equip jobs and notifications,
//! and the persisted save data. It is a dependency for all other crates in
//! the workspace.

pub mod agent;
pub mod event;
pub mod geometry;
pub mod ids;
pub mod job;
pub mod save;
pub mod weapon;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use agent::{AgentSnapshot, AgentStatus, CombatTrait, CurrentJob, OutfitFilter, Skills};
pub use event::{EquipmentChange, WorldEvent};
pub use geometry::{CellKey, Position};
pub use ids::{AgentId, JobId, Tick, WeaponDefId, WeaponId};
pub use job::{EquipJob, EquipSlot, FailureReason, JobOutcome, Notification};
pub use save::{SaveData, SAVE_DATA_VERSION};
pub use weapon::{
    Quality, RangeBands, WeaponCategory, WeaponKind, WeaponSnapshot, WeaponStats,
};
