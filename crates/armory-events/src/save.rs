//! Persisted State
//!
//! Only the forced-weapon records survive a save/load cycle. They are
//! stored by def identity, never by live instance, so a loaded game can
//! rebind them to whatever instance the agent carries.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{AgentId, WeaponDefId};

/// Current save data format version.
pub const SAVE_DATA_VERSION: u32 = 1;

/// Plain-data snapshot of the forced override records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    /// Agent to forced primary weapon def
    #[serde(default)]
    pub forced_primary: BTreeMap<AgentId, WeaponDefId>,
    /// Agent to forced sidearm defs
    #[serde(default)]
    pub forced_sidearm_defs: BTreeMap<AgentId, BTreeSet<WeaponDefId>>,
}

impl Default for SaveData {
    fn default() -> Self {
        Self {
            version: SAVE_DATA_VERSION,
            forced_primary: BTreeMap::new(),
            forced_sidearm_defs: BTreeMap::new(),
        }
    }
}

impl SaveData {
    pub fn is_empty(&self) -> bool {
        self.forced_primary.is_empty() && self.forced_sidearm_defs.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
