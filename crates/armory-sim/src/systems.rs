//! Host Systems
//!
//! What the stand-in host does each tick: colonists switch activities,
//! loot drops, weapons wear, errands complete. Every change the engine must
//! hear about is pushed to the [`Outbox`]. The last system copies the ECS
//! state into the [`Mirror`] the engine reads.

use bevy_ecs::prelude::*;
use rand::Rng;

use armory_core::MemoryWorld;
use armory_events::{
    CurrentJob, EquipJob, EquipSlot, EquipmentChange, FailureReason, JobId, JobOutcome, Position,
    WeaponId, WorldEvent,
};

use crate::components::{
    Colonist, EntityIndex, Errand, HostSettings, Mirror, Outbox, SimClock, SimRng, Weapon,
};
use crate::setup::roll_weapon;

const ACTIVITIES: [&str; 6] = ["wander", "construct", "cook", "research", "tend_patient", "idle"];

/// System: Idle colonists pick a new activity every few ticks
pub fn rotate_activities(
    clock: Res<SimClock>,
    settings: Res<HostSettings>,
    mut rng: ResMut<SimRng>,
    mut index: ResMut<EntityIndex>,
    mut colonists: Query<&mut Colonist, Without<Errand>>,
) {
    if clock.tick % settings.activity_interval.max(1) != 0 {
        return;
    }
    for mut colonist in colonists.iter_mut() {
        let class = ACTIVITIES[rng.0.gen_range(0..ACTIVITIES.len())];
        let job_id = JobId(index.next_activity_job);
        index.next_activity_job += 1;
        colonist.0.current_job = Some(CurrentJob::new(job_id, class));
    }
}

/// System: Raiders and traders leave weapons behind
pub fn drop_loot(
    mut commands: Commands,
    clock: Res<SimClock>,
    settings: Res<HostSettings>,
    mut rng: ResMut<SimRng>,
    mut index: ResMut<EntityIndex>,
    mut outbox: ResMut<Outbox>,
) {
    if clock.tick == 0 || clock.tick % settings.loot_interval.max(1) != 0 {
        return;
    }
    let size = settings.map_size;
    let position = Position::new(rng.0.gen_range(0..size), rng.0.gen_range(0..size));
    let weapon = roll_weapon(&mut rng.0, &mut index, Some(position));
    tracing::debug!("Loot: {} ({}) at {:?}", weapon.def, weapon.id, position);

    let id = weapon.id;
    let entity = commands.spawn(Weapon(weapon.clone())).id();
    index.weapons.insert(id, entity);
    outbox.0.push(WorldEvent::WeaponSpawned { weapon });
}

/// System: Weapons lying around slowly deteriorate
pub fn wear_weapons(
    clock: Res<SimClock>,
    settings: Res<HostSettings>,
    mut rng: ResMut<SimRng>,
    mut weapons: Query<&mut Weapon>,
    mut outbox: ResMut<Outbox>,
) {
    if clock.tick == 0 || clock.tick % settings.wear_interval.max(1) != 0 {
        return;
    }
    for mut weapon in weapons.iter_mut() {
        if weapon.0.position.is_none() || !rng.0.gen_bool(0.2) {
            continue;
        }
        weapon.0.condition = (weapon.0.condition - 0.1).max(0.05);
        weapon.0.modified_tick = clock.tick;
        outbox.0.push(WorldEvent::WeaponModified { weapon: weapon.0.id });
    }
}

/// System: Colonists that reached their target try to pick it up
pub fn resolve_errands(
    mut commands: Commands,
    clock: Res<SimClock>,
    settings: Res<HostSettings>,
    mut rng: ResMut<SimRng>,
    index: Res<EntityIndex>,
    mut colonists: Query<(Entity, &mut Colonist, &Errand)>,
    mut weapons: Query<&mut Weapon>,
    mut outbox: ResMut<Outbox>,
) {
    let now = clock.tick;
    for (entity, mut colonist, errand) in colonists.iter_mut() {
        let job = &errand.job;
        let expired = job.expiry.is_some_and(|expiry| now > expiry);
        if now < errand.arrives_at && !expired {
            continue;
        }
        commands.entity(entity).remove::<Errand>();
        colonist.0.current_job = None;

        let target = index
            .weapons
            .get(&job.target_weapon)
            .and_then(|e| weapons.get(*e).ok())
            .and_then(|w| w.0.position);

        let outcome = if expired {
            JobOutcome::Abandoned
        } else if let Some(position) = target {
            if rng.0.gen::<f32>() < settings.failure_chance {
                JobOutcome::Failed(FailureReason::Unreachable)
            } else {
                colonist.0.position = Some(position);
                equip(
                    &mut colonist,
                    job.target_weapon,
                    job.slot,
                    job.job_id,
                    position,
                    &index,
                    &mut weapons,
                    &mut outbox,
                );
                JobOutcome::Succeeded
            }
        } else {
            JobOutcome::Failed(FailureReason::TargetGone)
        };
        tracing::debug!("{} {}: {:?}", colonist.0.name, job.job_id, outcome);
        outbox.0.push(WorldEvent::JobEnded {
            job: job.job_id,
            outcome,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn equip(
    colonist: &mut Colonist,
    target: WeaponId,
    slot: EquipSlot,
    job: JobId,
    at: Position,
    index: &EntityIndex,
    weapons: &mut Query<&mut Weapon>,
    outbox: &mut Outbox,
) {
    let agent = colonist.0.id;
    let dropped = match slot {
        EquipSlot::Primary => colonist.0.primary.replace(target),
        EquipSlot::Sidearm { replaces } => {
            if let Some(old) = replaces {
                colonist.0.sidearms.retain(|w| *w != old);
            }
            colonist.0.sidearms.push(target);
            replaces
        }
    };

    if let Some(mut weapon) = index.weapons.get(&target).and_then(|e| weapons.get_mut(*e).ok()) {
        weapon.0.position = None;
    }
    outbox.0.push(WorldEvent::EquipmentChanged {
        agent,
        weapon: target,
        change: EquipmentChange::Equipped,
        slot,
        job: Some(job),
        player_forced: false,
    });

    let Some(old) = dropped else {
        return;
    };
    if let Some(mut weapon) = index.weapons.get(&old).and_then(|e| weapons.get_mut(*e).ok()) {
        weapon.0.position = Some(at);
        outbox.0.push(WorldEvent::EquipmentChanged {
            agent,
            weapon: old,
            change: EquipmentChange::Dropped,
            slot,
            job: Some(job),
            player_forced: false,
        });
        outbox.0.push(WorldEvent::WeaponSpawned {
            weapon: weapon.0.clone(),
        });
    }
}

/// System: Copy the ECS state into the engine-facing mirror
pub fn sync_mirror(
    clock: Res<SimClock>,
    colonists: Query<&Colonist>,
    weapons: Query<&Weapon>,
    mut mirror: ResMut<Mirror>,
) {
    let ammo_system = mirror.0.ammo_system;
    let mut world = MemoryWorld::new();
    world.tick = clock.tick;
    world.ammo_system = ammo_system;
    for colonist in colonists.iter() {
        world.insert_agent(colonist.0.clone());
    }
    for weapon in weapons.iter() {
        world.insert_weapon(weapon.0.clone());
    }
    mirror.0 = world;
}

/// Hands freshly issued jobs to the colonists that must carry them out.
pub fn assign_errands(world: &mut World, jobs: Vec<EquipJob>) {
    let now = world.resource::<SimClock>().tick;
    let walk_speed = world.resource::<HostSettings>().walk_speed.max(0.1);

    for job in jobs {
        let (agent_entity, target_entity) = {
            let index = world.resource::<EntityIndex>();
            (
                index.agents.get(&job.agent).copied(),
                index.weapons.get(&job.target_weapon).copied(),
            )
        };
        let (Some(agent_entity), Some(target_entity)) = (agent_entity, target_entity) else {
            continue;
        };
        let target = world.get::<Weapon>(target_entity).and_then(|w| w.0.position);
        let Some(mut colonist) = world.get_mut::<Colonist>(agent_entity) else {
            continue;
        };
        let distance = match (colonist.0.position, target) {
            (Some(from), Some(to)) => from.distance(&to),
            _ => 0.0,
        };
        // Without an interrupt the colonist finishes what it was doing first
        let finish_current = if job.interrupt_current || colonist.0.current_job.is_none() {
            0
        } else {
            20
        };
        let walk = (distance / walk_speed).ceil() as u64;
        colonist.0.current_job = Some(CurrentJob::new(job.job_id, "equip"));
        world.entity_mut(agent_entity).insert(Errand {
            arrives_at: now + finish_current + walk.max(1),
            job,
        });
    }
}
