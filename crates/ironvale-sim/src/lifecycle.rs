//! Spawn points, mob death handling, loot requests and timed respawns.

use ahash::AHashMap;
use ironvale_common::{
    DirectoryError, EntityId, ItemTypeId, LootTableId, SimTime, SpawnPointId, Vec3, WorldError,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::SimConfig;
use crate::directory::{DirectoryResult, EntityDirectory};
use crate::events::{Outbox, SimEvent};
use crate::mob::{AiState, Mob, MobKind, MobStats, WeaponCategory};

// ============================================================================
// Spawn points
// ============================================================================

const fn default_aggressive() -> bool {
    true
}

/// Template a mob is instantiated from.
///
/// Optional fields fall back to the mob kind's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Unique spawn point id
    pub id: SpawnPointId,
    /// Mob kind placed here
    pub kind: MobKind,
    /// Mob level
    pub level: u32,
    /// Home position
    pub position: Vec3,
    /// Stat block override
    #[serde(default)]
    pub stats: Option<MobStats>,
    /// Whether the mob scans for players
    #[serde(default = "default_aggressive")]
    pub aggressive: bool,
    /// Aggro radius override
    #[serde(default)]
    pub aggro_radius: Option<f32>,
    /// Weapon override
    #[serde(default)]
    pub weapon: Option<WeaponCategory>,
    /// Loot table rolled on death
    #[serde(default)]
    pub loot_table: Option<LootTableId>,
    /// Respawn delay override in milliseconds
    #[serde(default)]
    pub respawn_delay_ms: Option<u64>,
    /// Wander radius around home
    #[serde(default)]
    pub patrol_radius: f32,
}

impl SpawnPoint {
    /// Creates an aggressive spawn point with the kind's defaults.
    #[must_use]
    pub fn new(id: SpawnPointId, kind: MobKind, level: u32, position: Vec3) -> Self {
        Self {
            id,
            kind,
            level,
            position,
            stats: None,
            aggressive: true,
            aggro_radius: None,
            weapon: None,
            loot_table: None,
            respawn_delay_ms: None,
            patrol_radius: 0.0,
        }
    }

    /// Builder: override the stat block.
    #[must_use]
    pub fn with_stats(mut self, stats: MobStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Builder: set aggression.
    #[must_use]
    pub fn with_aggressive(mut self, aggressive: bool) -> Self {
        self.aggressive = aggressive;
        self
    }

    /// Builder: override the aggro radius.
    #[must_use]
    pub fn with_aggro_radius(mut self, radius: f32) -> Self {
        self.aggro_radius = Some(radius);
        self
    }

    /// Builder: override the weapon.
    #[must_use]
    pub fn with_weapon(mut self, weapon: WeaponCategory) -> Self {
        self.weapon = Some(weapon);
        self
    }

    /// Builder: set the loot table.
    #[must_use]
    pub fn with_loot_table(mut self, table: LootTableId) -> Self {
        self.loot_table = Some(table);
        self
    }

    /// Builder: override the respawn delay.
    #[must_use]
    pub fn with_respawn_delay(mut self, delay: Duration) -> Self {
        self.respawn_delay_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Builder: set the patrol radius.
    #[must_use]
    pub fn with_patrol_radius(mut self, radius: f32) -> Self {
        self.patrol_radius = radius;
        self
    }

    /// Effective stat block.
    #[must_use]
    pub fn effective_stats(&self) -> MobStats {
        self.stats.unwrap_or_else(|| self.kind.base_stats())
    }

    /// Effective aggro radius.
    #[must_use]
    pub fn effective_aggro_radius(&self) -> f32 {
        self.aggro_radius
            .unwrap_or_else(|| self.kind.default_aggro_radius())
    }

    /// Effective weapon.
    #[must_use]
    pub fn effective_weapon(&self) -> WeaponCategory {
        self.weapon.unwrap_or_else(|| self.kind.default_weapon())
    }

    /// Effective respawn delay.
    #[must_use]
    pub fn respawn_delay(&self, config: &SimConfig) -> Duration {
        self.respawn_delay_ms
            .map_or_else(|| config.respawn_delay(), Duration::from_millis)
    }

    /// Checks that the template can produce a valid mob.
    pub fn validate(&self) -> Result<(), WorldError> {
        let invalid = |reason: &str| WorldError::InvalidSpawnPoint {
            id: self.id,
            reason: reason.to_string(),
        };

        if self.level == 0 {
            return Err(invalid("level must be at least 1"));
        }
        if !self.position.is_finite() {
            return Err(invalid("position must be finite"));
        }
        if self.effective_stats().max_health() == 0 {
            return Err(invalid("constitution must be at least 1"));
        }
        let radius = self.effective_aggro_radius();
        if !radius.is_finite() || radius < 0.0 {
            return Err(invalid("aggro_radius must be a non-negative number"));
        }
        if !self.patrol_radius.is_finite() || self.patrol_radius < 0.0 {
            return Err(invalid("patrol_radius must be a non-negative number"));
        }
        Ok(())
    }

    /// Creates a fresh, full-health, idle mob at home.
    #[must_use]
    pub fn instantiate(&self, id: EntityId, now: SimTime) -> Mob {
        let stats = self.effective_stats();
        Mob {
            id,
            spawn_point: self.id,
            kind: self.kind,
            level: self.level,
            stats,
            health: stats.max_health(),
            max_health: stats.max_health(),
            position: self.position,
            home: self.position,
            aggressive: self.aggressive,
            aggro_radius: self.effective_aggro_radius(),
            weapon: self.effective_weapon(),
            loot_table: self.loot_table,
            patrol_radius: self.patrol_radius,
            state: AiState::Idle,
            target: None,
            last_ai_tick: None,
            state_since: now,
            patrol_waypoint: None,
        }
    }
}

/// Validated spawn points in registration order.
#[derive(Debug, Clone, Default)]
pub struct SpawnRegistry {
    points: AHashMap<SpawnPointId, SpawnPoint>,
    order: Vec<SpawnPointId>,
}

impl SpawnRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and adds a spawn point.
    pub fn register(&mut self, point: SpawnPoint) -> Result<(), WorldError> {
        point.validate()?;
        if self.points.contains_key(&point.id) {
            return Err(WorldError::DuplicateSpawnPoint(point.id));
        }
        self.order.push(point.id);
        self.points.insert(point.id, point);
        Ok(())
    }

    /// Looks up a spawn point.
    #[must_use]
    pub fn get(&self, id: SpawnPointId) -> Option<&SpawnPoint> {
        self.points.get(&id)
    }

    /// Iterates spawn points in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SpawnPoint> {
        self.order.iter().filter_map(|id| self.points.get(id))
    }

    /// Number of spawn points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if there are no spawn points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ============================================================================
// Loot
// ============================================================================

/// One rolled item stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDrop {
    /// Item type
    pub item: ItemTypeId,
    /// Stack size
    pub quantity: u32,
}

/// Loot collaborator that owns table definitions.
pub trait LootRoller: Send {
    /// Rolls `table` once.
    fn roll(&mut self, table: LootTableId) -> Vec<LootDrop>;
}

#[derive(Debug, Clone, Copy)]
struct LootRequest {
    mob: EntityId,
    table: LootTableId,
    position: Vec3,
}

// ============================================================================
// Manager
// ============================================================================

/// Owns spawn points and the death → loot → respawn cycle.
#[derive(Debug)]
pub struct LifecycleManager {
    config: SimConfig,
    registry: SpawnRegistry,
    spawned: AHashMap<SpawnPointId, EntityId>,
    respawn_at: AHashMap<EntityId, SimTime>,
    loot_queue: VecDeque<LootRequest>,
    warned_missing_loot: bool,
}

impl LifecycleManager {
    /// Creates a manager over a validated registry.
    #[must_use]
    pub fn new(config: SimConfig, registry: SpawnRegistry) -> Self {
        Self {
            config,
            registry,
            spawned: AHashMap::new(),
            respawn_at: AHashMap::new(),
            loot_queue: VecDeque::new(),
            warned_missing_loot: false,
        }
    }

    /// Spawn point registry.
    #[must_use]
    pub fn registry(&self) -> &SpawnRegistry {
        &self.registry
    }

    /// Mob instantiated from `point`, if populated.
    #[must_use]
    pub fn mob_for(&self, point: SpawnPointId) -> Option<EntityId> {
        self.spawned.get(&point).copied()
    }

    /// Instantiates one mob per spawn point that has none yet.
    ///
    /// Returns the number of mobs created.
    pub fn populate(
        &mut self,
        directory: &mut EntityDirectory,
        now: SimTime,
        outbox: &mut Outbox,
    ) -> DirectoryResult<usize> {
        let mut created = 0;
        for point in self.registry.iter() {
            if self.spawned.contains_key(&point.id) {
                continue;
            }

            let id = directory.next_mob_id();
            let mob = point.instantiate(id, now);
            directory.insert_mob(mob)?;
            self.spawned.insert(point.id, id);
            created += 1;

            debug!(
                mob = %id,
                kind = point.kind.display_name(),
                spawn_point = point.id.raw(),
                "Mob spawned"
            );
            outbox.push(SimEvent::MobSpawned {
                mob: id,
                kind: point.kind,
                spawn_point: point.id,
                position: point.position,
            });
        }

        info!(created, total = self.registry.len(), "Populated spawn points");
        Ok(created)
    }

    /// Marks a mob dead, schedules its respawn and queues its loot roll.
    ///
    /// Calling this again for a mob already awaiting respawn returns the
    /// existing deadline and emits nothing.
    pub fn handle_mob_death(
        &mut self,
        directory: &mut EntityDirectory,
        mob_id: EntityId,
        killer: Option<EntityId>,
        now: SimTime,
        outbox: &mut Outbox,
    ) -> DirectoryResult<SimTime> {
        if let Some(deadline) = self.respawn_at.get(&mob_id) {
            return Ok(*deadline);
        }

        let mob = directory
            .mob_mut(mob_id)
            .ok_or(DirectoryError::NotFound(mob_id))?;
        mob.health = 0;
        mob.target = None;
        mob.patrol_waypoint = None;
        mob.set_state(AiState::Dead, now);

        let delay = self
            .registry
            .get(mob.spawn_point)
            .map_or_else(|| self.config.respawn_delay(), |p| p.respawn_delay(&self.config));
        let deadline = now + delay;
        self.respawn_at.insert(mob_id, deadline);

        if let Some(table) = mob.loot_table {
            self.loot_queue.push_back(LootRequest {
                mob: mob_id,
                table,
                position: mob.position,
            });
        }

        info!(
            mob = %mob_id,
            kind = mob.kind.display_name(),
            killer = ?killer,
            respawn_in_secs = delay.as_secs(),
            "Mob died"
        );
        outbox.push(SimEvent::MobDied {
            mob: mob_id,
            killer,
            spawn_point: mob.spawn_point,
            respawn_at: deadline,
        });
        Ok(deadline)
    }

    /// Resets every mob whose respawn deadline has been reached.
    ///
    /// Returns the respawned ids in ascending order.
    pub fn process_respawns(
        &mut self,
        directory: &mut EntityDirectory,
        now: SimTime,
        outbox: &mut Outbox,
    ) -> Vec<EntityId> {
        let mut due: Vec<EntityId> = self
            .respawn_at
            .iter()
            .filter(|(_, deadline)| now.has_reached(**deadline))
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();

        let mut respawned = Vec::with_capacity(due.len());
        for id in due {
            self.respawn_at.remove(&id);

            let Some(mob) = directory.mob_mut(id) else {
                error!(mob = %id, "Respawn scheduled for unknown mob");
                continue;
            };
            let Some(point) = self.registry.get(mob.spawn_point) else {
                error!(
                    mob = %id,
                    spawn_point = mob.spawn_point.raw(),
                    "Respawn for unknown spawn point"
                );
                continue;
            };

            *mob = point.instantiate(id, now);
            debug!(mob = %id, "Mob respawned");
            outbox.push(SimEvent::MobRespawned {
                mob: id,
                position: point.position,
            });
            respawned.push(id);
        }
        respawned
    }

    /// Rolls every queued loot request.
    ///
    /// Without a roller the requests are discarded. Returns the number of
    /// requests that produced drops.
    pub fn process_loot(
        &mut self,
        roller: Option<&mut dyn LootRoller>,
        outbox: &mut Outbox,
    ) -> usize {
        if self.loot_queue.is_empty() {
            return 0;
        }

        let Some(roller) = roller else {
            if !self.warned_missing_loot {
                warn!("No loot roller attached; mob deaths will not drop loot");
                self.warned_missing_loot = true;
            }
            self.loot_queue.clear();
            return 0;
        };

        let mut dropped = 0;
        while let Some(request) = self.loot_queue.pop_front() {
            let drops = roller.roll(request.table);
            if drops.is_empty() {
                continue;
            }
            dropped += 1;
            outbox.push(SimEvent::LootDropRequested {
                mob: request.mob,
                table: request.table,
                position: request.position,
                drops,
            });
        }
        dropped
    }

    /// Checks if a mob is waiting to respawn.
    #[must_use]
    pub fn is_awaiting_respawn(&self, mob: EntityId) -> bool {
        self.respawn_at.contains_key(&mob)
    }

    /// Respawn deadline of a dead mob.
    #[must_use]
    pub fn respawn_deadline(&self, mob: EntityId) -> Option<SimTime> {
        self.respawn_at.get(&mob).copied()
    }

    /// Returns the number of pending respawns.
    #[must_use]
    pub fn pending_respawn_count(&self) -> usize {
        self.respawn_at.len()
    }

    /// Returns the number of queued loot rolls.
    #[must_use]
    pub fn pending_loot_count(&self) -> usize {
        self.loot_queue.len()
    }
}

/// Mock loot tables for testing.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MockLoot {
    pub(crate) tables: std::collections::HashMap<LootTableId, Vec<LootDrop>>,
    pub(crate) rolls: Vec<LootTableId>,
}

#[cfg(test)]
impl LootRoller for MockLoot {
    fn roll(&mut self, table: LootTableId) -> Vec<LootDrop> {
        self.rolls.push(table);
        self.tables.get(&table).cloned().unwrap_or_default()
    }
}
