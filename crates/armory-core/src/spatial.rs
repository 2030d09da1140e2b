//! Spatial Weapon Index
//!
//! Tracks every weapon lying on the map in two bucketings at once:
//!
//! - a uniform grid keyed by `floor(position / cell_size)`, for proximity queries
//! - coarse categories (melee, ranged short/medium/long), for filtered queries
//!
//! Every indexed weapon sits in exactly one grid bucket and one category
//! bucket. All mutation methods are idempotent, so replaying an event the
//! index has already seen leaves it unchanged.
//!
//! A full rebuild is staged: [`SpatialWeaponIndex::begin_rebuild`] only
//! enumerates ids, and [`SpatialWeaponIndex::continue_rebuild`] indexes a
//! bounded chunk per call. Queries during a rebuild see the partial index.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use armory_events::{
    CellKey, Position, RangeBands, Tick, WeaponCategory, WeaponDefId, WeaponId, WeaponSnapshot,
};

use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::host::WorldView;

/// What the index knows about one weapon.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub position: Position,
    pub cell: CellKey,
    pub category: WeaponCategory,
    pub def: WeaponDefId,
}

/// Result of [`SpatialWeaponIndex::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// Not a proper weapon, not on the map, or unusable stats
    Invalid,
    AlreadyPresent,
    /// The index is full; new weapons are refused rather than evicting old ones
    AtCapacity,
}

/// A weapon returned by a proximity query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearbyWeapon {
    pub id: WeaponId,
    pub distance_sq: i64,
}

/// Progress of a staged rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildProgress {
    /// No rebuild is running
    Idle,
    InProgress { processed: usize, remaining: usize },
    Completed { indexed: usize, skipped: usize },
}

/// Lifetime counters.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub inserted: u64,
    pub removed: u64,
    pub relocated: u64,
    pub rejected_at_capacity: u64,
    pub skipped_faults: u64,
    pub fallback_scans: u64,
    pub rebuilds_completed: u64,
}

#[derive(Debug)]
struct RebuildState {
    pending: VecDeque<WeaponId>,
    indexed: usize,
    skipped: usize,
    started_at: Tick,
}

/// Grid and category index of the weapons on one map.
#[derive(Debug)]
pub struct SpatialWeaponIndex {
    cell_size: i32,
    capacity: usize,
    chunk_size: usize,
    degraded_threshold: usize,
    expected_population: usize,
    bands: RangeBands,
    entries: HashMap<WeaponId, IndexEntry>,
    cells: HashMap<CellKey, Vec<WeaponId>>,
    categories: HashMap<WeaponCategory, BTreeSet<WeaponId>>,
    rebuild: Option<RebuildState>,
    initialized: bool,
    capacity_warned: bool,
    stats: IndexStats,
}

impl SpatialWeaponIndex {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            cell_size: config.cell_size.max(1),
            capacity: config.capacity,
            chunk_size: config.rebuild_chunk_size.max(1),
            degraded_threshold: config.degraded_enumeration_threshold,
            expected_population: config.expected_population,
            bands: config.range_bands.clone(),
            entries: HashMap::new(),
            cells: HashMap::new(),
            categories: HashMap::new(),
            rebuild: None,
            initialized: false,
            capacity_warned: false,
            stats: IndexStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cell_size(&self) -> i32 {
        self.cell_size
    }

    pub fn contains(&self, id: WeaponId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn entry(&self, id: WeaponId) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Number of weapons in one grid bucket.
    pub fn cell_population(&self, cell: CellKey) -> usize {
        self.cells.get(&cell).map(|b| b.len()).unwrap_or(0)
    }

    /// Number of weapons in one category bucket.
    pub fn category_population(&self, category: WeaponCategory) -> usize {
        self.categories.get(&category).map(|b| b.len()).unwrap_or(0)
    }

    /// Adds a weapon. No-op for invalid weapons, weapons already indexed, or a full index.
    pub fn add(&mut self, weapon: &WeaponSnapshot) -> AddOutcome {
        match self.try_add(weapon) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::trace!("Not indexing {}: {}", weapon.id, e);
                AddOutcome::Invalid
            }
        }
    }

    fn try_add(&mut self, weapon: &WeaponSnapshot) -> Result<AddOutcome, IndexError> {
        if !weapon.is_proper_weapon {
            return Ok(AddOutcome::Invalid);
        }
        let position = weapon.position.ok_or(IndexError::NotSpawned(weapon.id))?;
        if !weapon.stats.is_finite() {
            return Err(IndexError::NonFiniteStats(weapon.id));
        }
        if self.entries.contains_key(&weapon.id) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        if self.entries.len() >= self.capacity {
            self.stats.rejected_at_capacity += 1;
            if !self.capacity_warned {
                self.capacity_warned = true;
                tracing::warn!(
                    "Weapon index reached its capacity of {}; further weapons are not tracked",
                    self.capacity
                );
            }
            return Ok(AddOutcome::AtCapacity);
        }

        let cell = position.cell(self.cell_size);
        let category = weapon.category(&self.bands);
        self.cells.entry(cell).or_default().push(weapon.id);
        self.categories.entry(category).or_default().insert(weapon.id);
        self.entries.insert(
            weapon.id,
            IndexEntry {
                position,
                cell,
                category,
                def: weapon.def.clone(),
            },
        );
        self.stats.inserted += 1;
        Ok(AddOutcome::Inserted)
    }

    /// Removes a weapon from both bucketings. Returns false if it was not indexed.
    pub fn remove(&mut self, id: WeaponId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        self.detach_from_cell(id, entry.cell);
        if let Some(bucket) = self.categories.get_mut(&entry.category) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.categories.remove(&entry.category);
            }
        }
        self.stats.removed += 1;
        if self.entries.len() < self.capacity {
            self.capacity_warned = false;
        }
        true
    }

    fn detach_from_cell(&mut self, id: WeaponId, cell: CellKey) {
        if let Some(bucket) = self.cells.get_mut(&cell) {
            if let Some(pos) = bucket.iter().position(|w| *w == id) {
                bucket.swap_remove(pos);
            }
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Records a position change. Returns true when the weapon changed grid bucket.
    ///
    /// Weapons that are not indexed are ignored.
    pub fn move_weapon(&mut self, id: WeaponId, old: Position, new: Position) -> bool {
        let cell_size = self.cell_size;
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if old.cell(cell_size) != entry.cell {
            tracing::debug!(
                "Move of {} reported from {:?} but index has it in {:?}",
                id,
                old,
                entry.cell
            );
        }
        entry.position = new;
        let new_cell = new.cell(cell_size);
        if new_cell == entry.cell {
            return false;
        }
        let old_cell = std::mem::replace(&mut entry.cell, new_cell);
        self.detach_from_cell(id, old_cell);
        self.cells.entry(new_cell).or_default().push(id);
        self.stats.relocated += 1;
        true
    }

    /// Weapons near `position`, closest first.
    ///
    /// Searches outward ring by ring from the grid bucket containing
    /// `position`. Once at least `sufficient` weapons have been found, the
    /// walk stops as soon as no unvisited ring can hold anything closer than
    /// the nearest `min(sufficient, limit)` found so far, so those are always
    /// the true nearest. Otherwise it keeps expanding up to `max_radius`.
    /// At most `limit` weapons are returned.
    pub fn query_near(
        &self,
        position: Position,
        max_radius: f32,
        sufficient: usize,
        limit: usize,
    ) -> Vec<NearbyWeapon> {
        if self.entries.is_empty() || limit == 0 || max_radius.is_nan() || max_radius < 0.0 {
            return Vec::new();
        }
        let radius_sq = (max_radius as f64) * (max_radius as f64);
        let within = |distance_sq: i64| (distance_sq as f64) <= radius_sq;

        let origin = position.cell(self.cell_size);
        let cell_size = self.cell_size as i64;
        // Rings past i32::MAX cannot be addressed; such radii always take the bucket walk
        let max_ring = (max_radius as f64 / cell_size as f64)
            .ceil()
            .min(i32::MAX as f64 - 1.0) as i64
            + 1;
        let side = 2 * max_ring + 1;
        let cells_to_visit = side.saturating_mul(side) as u64;

        let mut found: Vec<NearbyWeapon> = Vec::new();

        if cells_to_visit > (self.cells.len() as u64).saturating_mul(4) {
            // Fewer occupied buckets than cells in the search square: walk the buckets.
            for (cell, bucket) in &self.cells {
                if cell.ring_distance(&origin) as i64 > max_ring {
                    continue;
                }
                for id in bucket {
                    let distance_sq = self.entries[id].position.distance_squared(&position);
                    if within(distance_sq) {
                        found.push(NearbyWeapon {
                            id: *id,
                            distance_sq,
                        });
                    }
                }
            }
        } else {
            let exact = sufficient.min(limit).max(1);
            let mut seen: HashSet<WeaponId> = HashSet::new();
            for ring in 0..=max_ring as i32 {
                for cell in origin.ring(ring) {
                    let Some(bucket) = self.cells.get(&cell) else {
                        continue;
                    };
                    for id in bucket {
                        if !seen.insert(*id) {
                            continue;
                        }
                        let distance_sq = self.entries[id].position.distance_squared(&position);
                        if within(distance_sq) {
                            found.push(NearbyWeapon {
                                id: *id,
                                distance_sq,
                            });
                        }
                    }
                }
                if found.len() < sufficient || found.len() < exact {
                    continue;
                }
                // Anything in ring + 1 lies more than ring * cell_size away on some axis
                found.sort_by_key(|n| (n.distance_sq, n.id));
                let bound = ring as i64 * cell_size;
                if found[exact - 1].distance_sq <= bound * bound {
                    break;
                }
            }
        }

        found.sort_by_key(|n| (n.distance_sq, n.id));
        found.truncate(limit);
        found
    }

    /// Every weapon in any of the given categories, without distance filtering.
    pub fn query_by_category(&self, categories: &[WeaponCategory]) -> Vec<WeaponId> {
        let mut ids: BTreeSet<WeaponId> = BTreeSet::new();
        for category in categories {
            if let Some(bucket) = self.categories.get(category) {
                ids.extend(bucket.iter().copied());
            }
        }
        ids.into_iter().collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuild.is_some()
    }

    /// Forgets the index contents; the next [`Self::ensure_initialized`] rebuilds it.
    pub fn invalidate(&mut self) {
        self.clear();
        self.initialized = false;
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.cells.clear();
        self.categories.clear();
        self.rebuild = None;
        self.capacity_warned = false;
    }

    /// Starts a staged rebuild on first use.
    pub fn ensure_initialized(&mut self, world: &dyn WorldView) {
        if !self.initialized {
            self.begin_rebuild(world);
        }
    }

    /// Clears the index and queues every weapon on the map for staged indexing.
    ///
    /// If the host's weapon enumeration looks implausibly small for a
    /// populated colony, falls back to scanning every item on the map.
    pub fn begin_rebuild(&mut self, world: &dyn WorldView) {
        self.clear();
        self.initialized = true;

        let mut ids = world.enumerate_weapons();
        let colonists = world.colonist_count();
        if ids.len() <= self.degraded_threshold && colonists >= self.expected_population {
            tracing::warn!(
                "Weapon enumeration returned {} weapons for {} colonists; falling back to a full item scan",
                ids.len(),
                colonists
            );
            self.stats.fallback_scans += 1;
            ids = world
                .enumerate_all_items()
                .into_iter()
                .filter(|id| world.weapon(*id).is_some_and(|w| w.is_spawned_weapon()))
                .collect();
        }

        tracing::info!("Rebuilding weapon index: {} weapons queued", ids.len());
        self.rebuild = Some(RebuildState {
            pending: ids.into(),
            indexed: 0,
            skipped: 0,
            started_at: world.current_tick(),
        });
    }

    /// Indexes the next chunk of a staged rebuild.
    ///
    /// A weapon that fails to index is skipped and counted; the rest of the
    /// chunk continues.
    pub fn continue_rebuild(&mut self, world: &dyn WorldView) -> RebuildProgress {
        let Some(mut state) = self.rebuild.take() else {
            return RebuildProgress::Idle;
        };

        let mut processed = 0;
        while processed < self.chunk_size {
            let Some(id) = state.pending.pop_front() else {
                break;
            };
            processed += 1;
            let result = world
                .weapon(id)
                .ok_or(IndexError::Unknown(id))
                .and_then(|weapon| self.try_add(weapon));
            match result {
                Ok(AddOutcome::Inserted) => state.indexed += 1,
                Ok(_) => {}
                Err(e) => {
                    state.skipped += 1;
                    self.stats.skipped_faults += 1;
                    tracing::debug!("Skipping weapon during rebuild: {}", e);
                }
            }
        }

        if state.pending.is_empty() {
            self.stats.rebuilds_completed += 1;
            tracing::info!(
                "Weapon index rebuilt: {} indexed, {} skipped, {} ticks",
                state.indexed,
                state.skipped,
                world.current_tick().saturating_sub(state.started_at)
            );
            RebuildProgress::Completed {
                indexed: state.indexed,
                skipped: state.skipped,
            }
        } else {
            let remaining = state.pending.len();
            self.rebuild = Some(state);
            RebuildProgress::InProgress {
                processed,
                remaining,
            }
        }
    }

    /// Drops weapons the world no longer has on the map. Returns the number removed.
    pub fn retain_live(&mut self, world: &dyn WorldView) -> usize {
        let dead: Vec<WeaponId> = self
            .entries
            .keys()
            .copied()
            .filter(|id| !world.weapon(*id).is_some_and(|w| w.is_spawned_weapon()))
            .collect();
        for id in &dead {
            self.remove(*id);
        }
        dead.len()
    }
}
