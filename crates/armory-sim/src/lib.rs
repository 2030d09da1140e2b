//! Headless Colony Harness
//!
//! Drives the armory engine against a small simulated colony built on
//! `bevy_ecs`. The ECS world plays the host: it owns colonists and weapons,
//! raises world events, and walks colonists to the weapons the engine
//! picks. Used for manual runs and for determinism checks.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;

use armory_core::{ArmoryConfig, ArmoryEngine, ArmoryError, EngineSummary};
use armory_events::{JobOutcome, WorldEvent};

pub mod components;
pub mod setup;
pub mod systems;

pub use components::*;

/// Parameters of one harness run.
#[derive(Debug, Clone)]
pub struct SimOptions {
    pub seed: u64,
    pub ticks: u64,
    pub colonists: usize,
    pub weapons: usize,
    /// Whether colonists' carried ammunition is reported to the engine
    pub ammo_system: bool,
    pub host: HostSettings,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            ticks: 2000,
            colonists: 6,
            weapons: 25,
            ammo_system: false,
            host: HostSettings::default(),
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimReport {
    pub ticks: u64,
    pub jobs_issued: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub jobs_abandoned: usize,
    pub armed_colonists: usize,
    pub notifications: Vec<String>,
    pub engine: EngineSummary,
    pub save_data: String,
}

/// Runs the harness for `options.ticks` ticks.
pub fn run(options: &SimOptions, config: ArmoryConfig) -> Result<SimReport, ArmoryError> {
    let mut world = World::new();
    world.insert_resource(SimClock::default());
    world.insert_resource(options.host.clone());
    world.insert_resource(EntityIndex::new());
    world.insert_resource(Outbox::default());
    let mut mirror = Mirror::default();
    mirror.0.ammo_system = options.ammo_system;
    world.insert_resource(mirror);

    let mut rng = SmallRng::seed_from_u64(options.seed);
    setup::spawn_colonists(&mut world, &mut rng, options.colonists, options.host.map_size);
    setup::spawn_weapons(&mut world, &mut rng, options.weapons, options.host.map_size);
    setup::arm_first_colonist(&mut world);
    world.insert_resource(SimRng(rng));

    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            systems::rotate_activities,
            systems::drop_loot,
            systems::wear_weapons,
            systems::resolve_errands,
            systems::sync_mirror,
        )
            .chain(),
    );

    // The engine resolves its capabilities against the first mirror
    schedule.run(&mut world);
    let mut engine = ArmoryEngine::for_world(config, &world.resource::<Mirror>().0)?;
    let mut report = SimReport {
        ticks: options.ticks,
        ..SimReport::default()
    };

    for tick in 0..options.ticks {
        if tick > 0 {
            world.resource_mut::<SimClock>().tick = tick;
            schedule.run(&mut world);
        }

        let events = std::mem::take(&mut world.resource_mut::<Outbox>().0);
        let mirror = world.remove_resource::<Mirror>().unwrap_or_default();

        for event in events {
            if let WorldEvent::JobEnded { outcome, .. } = &event {
                match outcome {
                    JobOutcome::Succeeded => report.jobs_succeeded += 1,
                    JobOutcome::Failed(_) => report.jobs_failed += 1,
                    JobOutcome::Abandoned => report.jobs_abandoned += 1,
                }
            }
            engine.handle_event(&mirror.0, event);
        }

        let output = engine.tick(&mirror.0);
        report.jobs_issued += output.jobs.len();
        for notification in output.notifications {
            let name = mirror
                .0
                .agents
                .get(&notification.agent())
                .map(|a| a.name.as_str())
                .unwrap_or("Someone");
            let text = notification.text(name);
            tracing::info!("[tick {}] {}", tick, text);
            report.notifications.push(text);
        }
        if let Some(maintenance) = output.maintenance {
            if maintenance.removed > 0 {
                tracing::debug!("[tick {}] maintenance removed {}", tick, maintenance.removed);
            }
        }

        world.insert_resource(mirror);
        systems::assign_errands(&mut world, output.jobs);
    }

    let mut colonists = world.query::<&Colonist>();
    report.armed_colonists = colonists
        .iter(&world)
        .filter(|c| !c.0.is_unarmed())
        .count();
    report.engine = engine.summary();
    report.save_data = engine
        .save_data()
        .to_json()
        .map_err(armory_core::SaveDataError::from)?;
    Ok(report)
}
