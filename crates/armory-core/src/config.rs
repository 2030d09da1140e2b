//! Configuration loading for the engine.
//!
//! All tuning lives in a TOML document owned by the host's settings module.
//! The engine only reads it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use armory_events::RangeBands;

use crate::oracle::OracleWeights;
use crate::policy::interrupt::InterruptionTable;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmoryConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub upgrade: UpgradeConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub interruption: InterruptionTable,
    #[serde(default)]
    pub sidearms: SidearmConfig,
    #[serde(default)]
    pub failures: FailureConfig,
    #[serde(default)]
    pub jobs: JobConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl ArmoryConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string and validates it.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks that every value is inside its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let upgrade = &self.upgrade;
        if upgrade.min_fraction > upgrade.max_fraction {
            return Err(invalid("upgrade.min_fraction", "must not exceed max_fraction"));
        }
        if !(upgrade.min_fraction..=upgrade.max_fraction).contains(&upgrade.threshold_fraction) {
            return Err(invalid(
                "upgrade.threshold_fraction",
                format!(
                    "{} is outside {}..={}",
                    upgrade.threshold_fraction, upgrade.min_fraction, upgrade.max_fraction
                ),
            ));
        }
        if self.index.cell_size <= 0 {
            return Err(invalid("index.cell_size", "must be positive"));
        }
        if self.index.capacity == 0 {
            return Err(invalid("index.capacity", "must be positive"));
        }
        if self.index.rebuild_chunk_size == 0 {
            return Err(invalid("index.rebuild_chunk_size", "must be positive"));
        }
        if self.index.range_bands.short_max > self.index.range_bands.medium_max {
            return Err(invalid("index.range_bands", "short_max must not exceed medium_max"));
        }
        for (field, radius) in [
            ("search.max_radius", self.search.max_radius),
            ("search.unarmed_radius", self.search.unarmed_radius),
        ] {
            if !(0.0..=MAX_SEARCH_RADIUS).contains(&radius) {
                return Err(invalid(
                    field,
                    format!("{} is outside 0..={}", radius, MAX_SEARCH_RADIUS),
                ));
            }
        }
        if self.search.initial_radius.is_nan()
            || self.search.initial_radius <= 0.0
            || self.search.initial_radius > self.search.max_radius
        {
            return Err(invalid(
                "search.initial_radius",
                "must be positive and not exceed max_radius",
            ));
        }
        if self.search.max_candidates == 0 {
            return Err(invalid("search.max_candidates", "must be positive"));
        }
        if self.interruption.medium_ratio < 1.0
            || self.interruption.high_ratio < self.interruption.medium_ratio
        {
            return Err(invalid(
                "interruption",
                "ratios must satisfy 1.0 <= medium_ratio <= high_ratio",
            ));
        }
        if self.schedule.base_interval_ticks == 0 || self.schedule.unarmed_interval_ticks == 0 {
            return Err(invalid("schedule", "intervals must be positive"));
        }
        if self.maintenance.ops_per_tick == 0 {
            return Err(invalid("maintenance.ops_per_tick", "must be positive"));
        }
        Ok(())
    }
}

/// Largest search radius a configuration may ask for, in cells.
pub const MAX_SEARCH_RADIUS: f32 = 100_000.0;

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// Global switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Master toggle; when off the engine never emits jobs
    pub enabled: bool,
    /// Seed for evaluation jitter
    pub seed: u64,
    /// Upper bound on agent evaluations per tick
    pub max_evaluations_per_tick: usize,
    /// Evaluate temporary colony members (quest lodgers, borrowed pawns)
    pub allow_temporary_agents: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: 42,
            max_evaluations_per_tick: 4,
            allow_temporary_agents: false,
        }
    }
}

/// Upgrade threshold, expressed as a fraction of the current score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Candidate must score at least `current * (1 + threshold_fraction)`
    pub threshold_fraction: f32,
    /// Lowest value the settings screen may assign
    pub min_fraction: f32,
    /// Highest value the settings screen may assign
    pub max_fraction: f32,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.05,
            min_fraction: 0.01,
            max_fraction: 1.0,
        }
    }
}

/// Candidate search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// First search radius in cells
    pub initial_radius: f32,
    /// Largest radius for armed agents
    pub max_radius: f32,
    /// Largest radius for unarmed agents
    pub unarmed_radius: f32,
    /// Spiral search stops after a ring once this many weapons are found
    pub sufficient_count: usize,
    /// Candidates returned for small colonies
    pub max_candidates: usize,
    /// Expand the radius while fewer usable candidates than this are found
    pub min_candidates: usize,
    /// Colony size above which candidate limits shrink
    pub large_colony_size: usize,
    /// Colony size above which candidate limits shrink further
    pub huge_colony_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_radius: 30.0,
            max_radius: 60.0,
            unarmed_radius: 90.0,
            sufficient_count: 8,
            max_candidates: 20,
            min_candidates: 3,
            large_colony_size: 20,
            huge_colony_size: 35,
        }
    }
}

/// Spatial index sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Edge length of each grid bucket in cells
    pub cell_size: i32,
    /// Hard cap on tracked weapons
    pub capacity: usize,
    /// Weapons processed per staged rebuild step
    pub rebuild_chunk_size: usize,
    /// Enumerations at or below this size are treated as suspicious
    pub degraded_enumeration_threshold: usize,
    /// Colonist count at which a suspicious enumeration triggers the fallback scan
    pub expected_population: usize,
    #[serde(default)]
    pub range_bands: RangeBands,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cell_size: 16,
            capacity: 2000,
            rebuild_chunk_size: 64,
            degraded_enumeration_threshold: 2,
            expected_population: 3,
            range_bands: RangeBands::default(),
        }
    }
}

/// Score cache lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries older than this are recomputed
    pub ttl_ticks: u64,
    /// Entries beyond this count are computed but not stored
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ticks: 2500,
            max_entries: 20_000,
        }
    }
}

/// Per-agent evaluation cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Interval between evaluations of an armed agent in a small colony
    pub base_interval_ticks: u64,
    /// Interval between evaluations of an unarmed agent
    pub unarmed_interval_ticks: u64,
    /// Colony size up to which the base interval applies unscaled
    pub population_baseline: usize,
    /// Interval growth per colonist above the baseline, as a fraction of the base
    pub per_colonist_scale: f32,
    pub max_interval_ticks: u64,
    /// Random spread applied to each interval, as a fraction
    pub jitter_fraction: f32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            base_interval_ticks: 250,
            unarmed_interval_ticks: 60,
            population_baseline: 10,
            per_colonist_scale: 0.05,
            max_interval_ticks: 1200,
            jitter_fraction: 0.2,
        }
    }
}

/// Sidearm evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SidearmConfig {
    pub enabled: bool,
    pub max_sidearms: usize,
}

impl Default for SidearmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sidearms: 2,
        }
    }
}

/// Repeated-failure handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureConfig {
    /// Failures of the same def before it is blacklisted for the agent
    pub blacklist_threshold: u32,
    pub blacklist_duration_ticks: u64,
    /// Failure records idle for this long are forgotten
    pub forget_after_ticks: u64,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            blacklist_threshold: 3,
            blacklist_duration_ticks: 30_000,
            forget_after_ticks: 60_000,
        }
    }
}

/// Job lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Expiry of upgrade jobs; unarmed jobs never expire
    pub expiry_ticks: u64,
    /// Provenance records older than this are treated as abandoned
    pub retention_ticks: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            expiry_ticks: 2000,
            retention_ticks: 5000,
        }
    }
}

/// User-facing notification limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Minimum ticks between two notifications about the same agent
    pub per_agent_interval_ticks: u64,
    /// Minimum ticks between any two notifications
    pub global_interval_ticks: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_agent_interval_ticks: 2500,
            global_interval_ticks: 120,
        }
    }
}

/// Staggered cleanup cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Ticks between maintenance steps
    pub interval_ticks: u64,
    /// Cleanup sub-operations run per step
    pub ops_per_tick: usize,
    /// Removals in one full cycle above this are reported as a likely leak
    pub leak_warning_threshold: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 60,
            ops_per_tick: 1,
            leak_warning_threshold: 500,
        }
    }
}

/// Scoring oracle and situational modifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Consult the ammunition capability when the host provides one
    pub consult_ammo: bool,
    /// Score multiplier for ranged weapons the agent has no ammunition for
    pub missing_ammo_factor: f32,
    /// Rounds required before a weapon counts as supplied
    pub min_ammo_rounds: u32,
    #[serde(default)]
    pub weights: OracleWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            consult_ammo: true,
            missing_ammo_factor: 0.1,
            min_ammo_rounds: 10,
            weights: OracleWeights::default(),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("invalid value for `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Generates a documented default configuration file.
pub fn default_config_toml() -> String {
    r#"# Weapon evaluation engine configuration

[general]
enabled = true
seed = 42
max_evaluations_per_tick = 4
allow_temporary_agents = false

[upgrade]
threshold_fraction = 0.05
min_fraction = 0.01
max_fraction = 1.0

[search]
initial_radius = 30.0
max_radius = 60.0
unarmed_radius = 90.0
sufficient_count = 8
max_candidates = 20
min_candidates = 3
large_colony_size = 20
huge_colony_size = 35

[index]
cell_size = 16
capacity = 2000
rebuild_chunk_size = 64
degraded_enumeration_threshold = 2
expected_population = 3

[index.range_bands]
short_max = 16.0
medium_max = 30.0

[cache]
ttl_ticks = 2500
max_entries = 20000

[schedule]
base_interval_ticks = 250
unarmed_interval_ticks = 60
population_baseline = 10
per_colonist_scale = 0.05
max_interval_ticks = 1200
jitter_fraction = 0.2

[interruption]
medium_ratio = 1.10
high_ratio = 1.20
default_criticality = "medium"

[interruption.classes]
extinguish_self = "critical"
flee = "critical"
flee_and_cower = "critical"
tend_patient_emergency = "critical"
rescue = "critical"
beat_fire = "critical"
attack_melee = "critical"
attack_static = "critical"
wait_combat = "critical"
equip = "critical"
tend_patient = "high"
feed_patient = "high"
capture = "high"
operate = "high"
haul_to_safety = "high"
construct = "medium"
mine = "medium"
cook = "medium"
research = "medium"
sow = "medium"
harvest = "medium"
repair = "medium"
wander = "low"
idle = "low"
wait = "low"
goto_wander = "low"
socialize = "low"
relax = "low"
clean = "low"

[sidearms]
enabled = true
max_sidearms = 2

[failures]
blacklist_threshold = 3
blacklist_duration_ticks = 30000
forget_after_ticks = 60000

[jobs]
expiry_ticks = 2000
retention_ticks = 5000

[notifications]
enabled = true
per_agent_interval_ticks = 2500
global_interval_ticks = 120

[maintenance]
interval_ticks = 60
ops_per_tick = 1
leak_warning_threshold = 500

[scoring]
consult_ammo = true
missing_ammo_factor = 0.1
min_ammo_rounds = 10

[scoring.weights]
armor_penetration = 1.0
range = 0.01
condition_floor = 0.5
skill_per_level = 0.05
skill_baseline = 5
brawler_melee = 1.5
brawler_ranged = 0.2
trigger_happy = 1.05
careful_shooter = 1.1
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::interrupt::JobCriticality;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ArmoryConfig::default();

        assert!(config.general.enabled);
        assert_eq!(config.upgrade.threshold_fraction, 0.05);
        assert_eq!(config.index.cell_size, 16);
        assert_eq!(config.maintenance.ops_per_tick, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
            [upgrade]
            threshold_fraction = 0.2

            [search]
            max_radius = 80.0
        "#;

        let config = ArmoryConfig::from_str(toml).unwrap();

        assert_eq!(config.upgrade.threshold_fraction, 0.2);
        assert_eq!(config.search.max_radius, 80.0);
        // Default values
        assert_eq!(config.search.initial_radius, 30.0);
        assert_eq!(config.cache.ttl_ticks, 2500);
    }

    #[test]
    fn test_threshold_outside_range_rejected() {
        let toml = r#"
            [upgrade]
            threshold_fraction = 1.5
        "#;
        match ArmoryConfig::from_str(toml) {
            Err(ConfigError::Invalid { field, .. }) => {
                assert_eq!(field, "upgrade.threshold_fraction")
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_cell_size_rejected() {
        let toml = r#"
            [index]
            cell_size = 0
        "#;
        assert!(matches!(
            ArmoryConfig::from_str(toml),
            Err(ConfigError::Invalid { field: "index.cell_size", .. })
        ));
    }

    #[test]
    fn test_unbounded_search_radius_rejected() {
        for radius in [f32::INFINITY, f32::NAN, 1.0e12, -5.0] {
            let mut config = ArmoryConfig::default();
            config.search.unarmed_radius = radius;
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::Invalid {
                        field: "search.unarmed_radius",
                        ..
                    })
                ),
                "radius {} accepted",
                radius
            );
        }

        let mut config = ArmoryConfig::default();
        config.search.max_radius = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_interruption_ratios_rejected() {
        let mut config = ArmoryConfig::default();
        config.interruption.medium_ratio = 1.3;
        config.interruption.high_ratio = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_toml_parses() {
        let config = ArmoryConfig::from_str(&default_config_toml()).unwrap();

        assert_eq!(config.upgrade.threshold_fraction, 0.05);
        assert_eq!(config.index.range_bands.medium_max, 30.0);
        assert_eq!(
            config.interruption.classify("flee"),
            JobCriticality::Critical
        );
        assert_eq!(config.interruption.classify("wander"), JobCriticality::Low);
        assert_eq!(
            config.interruption.classes.len(),
            crate::policy::interrupt::InterruptionTable::default().classes.len()
        );
    }

    #[test]
    fn test_config_to_toml_round_trip() {
        let config = ArmoryConfig::default();
        let toml = config.to_toml().unwrap();

        assert!(toml.contains("[upgrade]"));
        assert!(toml.contains("[interruption.classes]"));

        let parsed = ArmoryConfig::from_str(&toml).unwrap();
        assert_eq!(parsed.search.max_candidates, config.search.max_candidates);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[general]\nenabled = false\n").unwrap();

        let config = ArmoryConfig::from_file(file.path()).unwrap();
        assert!(!config.general.enabled);

        let missing = ArmoryConfig::from_file(Path::new("/nonexistent/armory.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
