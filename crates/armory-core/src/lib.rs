//! Armory: automatic weapon evaluation for colony agents.
//!
//! The engine sits beside a host simulation. It keeps a spatial index of the
//! weapons lying on the map, scores them per agent through a pluggable
//! oracle, and decides when an agent should walk over and pick up something
//! better. The host executes the resulting jobs; the engine never touches
//! agents or weapons directly.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  WorldEvent / WorldView  ┌──────────────┐   EquipJob / Notification
//! │    host    │ ───────────────────────▶ │ ArmoryEngine │ ─────────────────────────▶
//! └────────────┘                          └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`engine`]: The facade; event routing, evaluation ticks, job commits
//! - [`spatial`]: Grid and category index of weapons on the map
//! - [`cache`]: Two-tier score memo with lazy invalidation
//! - [`oracle`]: Scoring oracle trait and the stat-driven default
//! - [`capability`]: Optional host integrations such as ammunition
//! - [`search`]: Expanding-radius candidate search
//! - [`policy`]: Eligibility, upgrade threshold, interruption, schedule, blacklist
//! - [`forced`]: Player-assigned weapons the engine must not replace
//! - [`provenance`]: In-flight job records and weapon reservations
//! - [`maintenance`]: Round-robin cleanup of every tracker
//! - [`think_tree`]: Injection of the evaluation node into a host decision tree

pub mod cache;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod forced;
pub mod host;
pub mod maintenance;
pub mod notify;
pub mod oracle;
pub mod policy;
pub mod provenance;
pub mod search;
pub mod spatial;
pub mod think_tree;

// Re-export engine types
pub use engine::{ArmoryEngine, EngineSummary, TickOutput};

// Re-export config types
pub use config::{
    default_config_toml, ArmoryConfig, CacheConfig, ConfigError, FailureConfig, GeneralConfig,
    IndexConfig, JobConfig, MaintenanceConfig, NotificationConfig, ScheduleConfig, ScoringConfig,
    SearchConfig, SidearmConfig, UpgradeConfig,
};

// Re-export error types
pub use error::{ArmoryError, IndexError, SaveDataError, ScoreError};

// Re-export host types
pub use host::{MemoryWorld, WorldView};

// Re-export scoring types
pub use cache::{CacheStats, ScoreCache};
pub use capability::{AmmoCapability, AmmoStatus, Capabilities, CarriedAmmo, NoAmmoSystem};
pub use oracle::{is_usable, OracleWeights, ScoringOracle, StatOracle, UNUSABLE_SCORE};

// Re-export index and search types
pub use search::{Candidate, CandidateSearch, SearchResult};
pub use spatial::{AddOutcome, IndexStats, NearbyWeapon, RebuildProgress, SpatialWeaponIndex};

// Re-export policy types
pub use policy::blacklist::{FailureTracker, FailureVerdict};
pub use policy::interrupt::{InterruptDecision, InterruptionTable, JobCriticality, Urgency};
pub use policy::schedule::EvaluationSchedule;
pub use policy::{
    check_eligibility, classify_agent, is_upgrade, upgrade_ratio, AgentState,
    EquipDecisionPolicy, IneligibleReason, PolicyContext, Proposal, Verdict,
};

// Re-export tracker types
pub use forced::{ForcedOverrideTracker, ForcedPrimary};
pub use maintenance::{CleanupTarget, Maintainable, MaintenanceReport, StaggeredMaintenance};
pub use notify::Notifier;
pub use provenance::{ProvenanceRecord, ProvenanceTracker, Reservation, ReservationSet};
pub use think_tree::{EvaluationDriver, InjectionError, InjectionPoint, InjectionRule, ThinkNode};
