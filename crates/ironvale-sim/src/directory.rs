//! Entity directory: the authoritative record of mob and player vitals.
//!
//! Mobs and players live in separate slot arenas keyed by [`EntityId`]. All
//! cross references elsewhere in the simulation are ids that resolve through
//! this directory; nothing else holds position or health.

use ahash::AHashMap;
use ironvale_common::{distance, DirectoryError, EntityId, SimTime, Vec3, MOB_ID_BASE};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::mob::{Mob, WeaponCategory};

/// Result alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

// ============================================================================
// Arena
// ============================================================================

/// Slot storage with id lookup and free-slot reuse.
///
/// Iteration follows insertion order, even when a new entry lands in a
/// reused slot.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Option<(EntityId, T)>>,
    free_list: Vec<usize>,
    id_to_index: AHashMap<EntityId, usize>,
    /// Occupied slot indices, oldest insertion first
    order: Vec<usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            id_to_index: AHashMap::new(),
            order: Vec::new(),
        }
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_index.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_index.is_empty()
    }

    /// Returns true if `id` is stored.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    /// Inserts `value` under `id`.
    pub fn insert(&mut self, id: EntityId, value: T) -> DirectoryResult<()> {
        if self.id_to_index.contains_key(&id) {
            return Err(DirectoryError::AlreadyRegistered(id));
        }

        let index = if let Some(free_index) = self.free_list.pop() {
            self.slots[free_index] = Some((id, value));
            free_index
        } else {
            self.slots.push(Some((id, value)));
            self.slots.len() - 1
        };

        self.id_to_index.insert(id, index);
        self.order.push(index);
        Ok(())
    }

    /// Removes and returns the value stored under `id`.
    pub fn remove(&mut self, id: EntityId) -> DirectoryResult<T> {
        let index = self
            .id_to_index
            .remove(&id)
            .ok_or(DirectoryError::NotFound(id))?;
        self.free_list.push(index);
        self.order.retain(|&i| i != index);
        self.slots[index]
            .take()
            .map(|(_, value)| value)
            .ok_or(DirectoryError::NotFound(id))
    }

    /// Gets a reference to the value stored under `id`.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        let index = *self.id_to_index.get(&id)?;
        self.slots.get(index)?.as_ref().map(|(_, value)| value)
    }

    /// Gets a mutable reference to the value stored under `id`.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        let index = *self.id_to_index.get(&id)?;
        self.slots.get_mut(index)?.as_mut().map(|(_, value)| value)
    }

    /// Iterates `(id, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.order.iter().filter_map(|&index| {
            self.slots
                .get(index)?
                .as_ref()
                .map(|(id, value)| (*id, value))
        })
    }
}

// ============================================================================
// Player records
// ============================================================================

/// Latest known state of a connected player.
///
/// Supplied by the player-directory collaborator through
/// [`EntityDirectory::sync_player`]; combat mutates only `health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Player id (must be below the mob id range)
    pub id: EntityId,
    /// Effective combat level
    pub level: u32,
    /// Current position
    pub position: Vec3,
    /// Current health
    pub health: u32,
    /// Maximum health
    pub max_health: u32,
    /// Melee damage bonus
    pub strength: u32,
    /// Ranged damage bonus
    pub ranged: u32,
    /// Damage mitigation
    pub defense: u32,
    /// Base damage of the equipped weapon
    pub weapon_damage: u32,
    /// Equipped weapon category
    pub weapon: WeaponCategory,
}

impl PlayerRecord {
    /// Creates a full-health player with zeroed combat attributes.
    #[must_use]
    pub fn new(id: EntityId, level: u32, position: Vec3, max_health: u32) -> Self {
        Self {
            id,
            level,
            position,
            health: max_health,
            max_health,
            strength: 0,
            ranged: 0,
            defense: 0,
            weapon_damage: 1,
            weapon: WeaponCategory::Melee,
        }
    }

    /// Builder: set combat attributes.
    #[must_use]
    pub fn with_attributes(mut self, strength: u32, ranged: u32, defense: u32) -> Self {
        self.strength = strength;
        self.ranged = ranged;
        self.defense = defense;
        self
    }

    /// Builder: set equipped weapon.
    #[must_use]
    pub fn with_weapon(mut self, weapon: WeaponCategory, damage: u32) -> Self {
        self.weapon = weapon;
        self.weapon_damage = damage;
        self
    }

    /// Builder: set current health.
    #[must_use]
    pub fn with_health(mut self, health: u32) -> Self {
        self.health = health;
        self
    }

    /// Returns true while health is above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }
}

// ============================================================================
// Combat views
// ============================================================================

/// Combat-relevant view of either a mob or a player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatProfile {
    /// Current position
    pub position: Vec3,
    /// Level
    pub level: u32,
    /// Melee damage bonus
    pub strength: u32,
    /// Ranged damage bonus
    pub ranged: u32,
    /// Damage mitigation
    pub defense: u32,
    /// Base weapon damage
    pub weapon_damage: u32,
    /// Whether the entity can fight
    pub alive: bool,
}

impl CombatProfile {
    /// Attribute bonus for a weapon category.
    #[must_use]
    pub const fn attribute_bonus(&self, weapon: WeaponCategory) -> u32 {
        match weapon {
            WeaponCategory::Melee => self.strength,
            WeaponCategory::Ranged => self.ranged,
        }
    }
}

/// Outcome of applying damage through the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageApplied {
    /// Damage actually subtracted
    pub applied: u32,
    /// Health left on the target
    pub remaining: u32,
    /// True if this application brought health to zero
    pub killed: bool,
}

// ============================================================================
// Directory
// ============================================================================

/// Authoritative store of mob and player state.
#[derive(Debug, Default)]
pub struct EntityDirectory {
    mobs: Arena<Mob>,
    players: Arena<PlayerRecord>,
    next_mob_seq: u64,
}

impl EntityDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Mobs ===

    /// Allocates the next id in the mob range.
    pub fn next_mob_id(&mut self) -> EntityId {
        let id = EntityId::from_raw(MOB_ID_BASE + self.next_mob_seq);
        self.next_mob_seq += 1;
        id
    }

    /// Registers a mob.
    pub fn insert_mob(&mut self, mob: Mob) -> DirectoryResult<()> {
        self.mobs.insert(mob.id, mob)
    }

    /// Looks up a mob, dead or alive.
    #[must_use]
    pub fn mob(&self, id: EntityId) -> Option<&Mob> {
        self.mobs.get(id)
    }

    /// Looks up a mob mutably.
    pub fn mob_mut(&mut self, id: EntityId) -> Option<&mut Mob> {
        self.mobs.get_mut(id)
    }

    /// Looks up a mob only if it is alive.
    #[must_use]
    pub fn active_mob(&self, id: EntityId) -> Option<&Mob> {
        self.mobs.get(id).filter(|mob| mob.is_alive())
    }

    /// Number of registered mobs, including dead ones.
    #[must_use]
    pub fn mob_count(&self) -> usize {
        self.mobs.len()
    }

    /// All mob ids in ascending order.
    #[must_use]
    pub fn mob_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.mobs.iter().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids
    }

    /// Iterates living mobs.
    pub fn live_mobs(&self) -> impl Iterator<Item = &Mob> {
        self.mobs.iter().map(|(_, mob)| mob).filter(|mob| mob.is_alive())
    }

    /// Living mobs within `radius` of `center`, nearest first.
    #[must_use]
    pub fn mobs_in_radius(&self, center: Vec3, radius: f32) -> Vec<&Mob> {
        let mut found: Vec<(&Mob, f32)> = self
            .live_mobs()
            .map(|mob| (mob, distance(center, mob.position)))
            .filter(|(_, d)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found.into_iter().map(|(mob, _)| mob).collect()
    }

    // === Players ===

    /// Inserts or replaces a player record.
    ///
    /// Health above max is clamped. Ids from the mob range are rejected.
    pub fn sync_player(&mut self, mut record: PlayerRecord) -> DirectoryResult<()> {
        if !record.id.is_player() {
            return Err(DirectoryError::InvalidPlayerId(record.id));
        }
        if record.health > record.max_health {
            error!(
                player = %record.id,
                health = record.health,
                max_health = record.max_health,
                "Player health above max; clamping"
            );
            record.health = record.max_health;
        }

        match self.players.get_mut(record.id) {
            Some(existing) => *existing = record,
            None => self.players.insert(record.id, record)?,
        }
        Ok(())
    }

    /// Removes a player record.
    pub fn remove_player(&mut self, id: EntityId) -> DirectoryResult<PlayerRecord> {
        self.players.remove(id)
    }

    /// Looks up a player.
    #[must_use]
    pub fn player(&self, id: EntityId) -> Option<&PlayerRecord> {
        self.players.get(id)
    }

    /// Number of connected players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Iterates living players in directory order.
    pub fn live_players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players
            .iter()
            .map(|(_, player)| player)
            .filter(|player| player.is_alive())
    }

    // === Shared ===

    /// Returns true if `id` resolves to a mob or a player.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.mobs.contains(id) || self.players.contains(id)
    }

    /// Position of any entity.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<Vec3> {
        if id.is_mob() {
            self.mobs.get(id).map(|mob| mob.position)
        } else {
            self.players.get(id).map(|player| player.position)
        }
    }

    /// Returns true if `id` resolves to a living entity.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.combat_profile(id).is_some_and(|profile| profile.alive)
    }

    /// Combat view of any entity.
    #[must_use]
    pub fn combat_profile(&self, id: EntityId) -> Option<CombatProfile> {
        if id.is_mob() {
            self.mobs.get(id).map(|mob| CombatProfile {
                position: mob.position,
                level: mob.level,
                strength: mob.stats.strength,
                ranged: mob.stats.ranged,
                defense: mob.stats.defense,
                weapon_damage: mob.stats.weapon_damage,
                alive: mob.is_alive(),
            })
        } else {
            self.players.get(id).map(|player| CombatProfile {
                position: player.position,
                level: player.level,
                strength: player.strength,
                ranged: player.ranged,
                defense: player.defense,
                weapon_damage: player.weapon_damage,
                alive: player.is_alive(),
            })
        }
    }

    /// Subtracts `amount` from an entity's health, clamped at zero.
    ///
    /// A mob brought to zero enters the dead state in the same step.
    pub fn apply_damage(
        &mut self,
        id: EntityId,
        amount: u32,
        now: SimTime,
    ) -> DirectoryResult<DamageApplied> {
        if id.is_mob() {
            let mob = self.mobs.get_mut(id).ok_or(DirectoryError::NotFound(id))?;
            let was_alive = mob.is_alive();
            let applied = mob.apply_damage(amount, now);
            debug_assert!(mob.invariants_hold(), "mob {id} invariant broken");
            Ok(DamageApplied {
                applied,
                remaining: mob.health,
                killed: was_alive && mob.health == 0,
            })
        } else {
            let player = self.players.get_mut(id).ok_or(DirectoryError::NotFound(id))?;
            let was_alive = player.is_alive();
            let applied = amount.min(player.health);
            player.health -= applied;
            Ok(DamageApplied {
                applied,
                remaining: player.health,
                killed: was_alive && player.health == 0,
            })
        }
    }
}

/// Builds a full-health idle mob at `home` with the kind's defaults.
#[cfg(test)]
pub(crate) fn test_mob(id: EntityId, kind: crate::mob::MobKind, level: u32, home: Vec3) -> Mob {
    let stats = kind.base_stats();
    Mob {
        id,
        spawn_point: ironvale_common::SpawnPointId::new(1),
        kind,
        level,
        stats,
        health: stats.max_health(),
        max_health: stats.max_health(),
        position: home,
        home,
        aggressive: true,
        aggro_radius: kind.default_aggro_radius(),
        weapon: kind.default_weapon(),
        loot_table: None,
        patrol_radius: 0.0,
        state: crate::mob::AiState::Idle,
        target: None,
        last_ai_tick: None,
        state_since: SimTime::ZERO,
        patrol_waypoint: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mob::{AiState, MobKind};

    #[test]
    fn test_arena_reuse_slot_keeps_insertion_order() {
        let mut arena = Arena::new();
        let a = EntityId::from_raw(1);
        let b = EntityId::from_raw(2);
        let c = EntityId::from_raw(3);

        arena.insert(a, "a").expect("insert");
        arena.insert(b, "b").expect("insert");
        assert_eq!(arena.remove(a).expect("remove"), "a");
        arena.insert(c, "c").expect("insert");

        // c took a's slot but still iterates last
        assert_eq!(arena.slots.len(), 2);
        let order: Vec<_> = arena.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![b, c]);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_arena_duplicate_rejected() {
        let mut arena = Arena::new();
        let id = EntityId::from_raw(5);
        arena.insert(id, 1).expect("insert");
        assert!(matches!(
            arena.insert(id, 2),
            Err(DirectoryError::AlreadyRegistered(_))
        ));
        assert!(matches!(
            arena.remove(EntityId::from_raw(6)),
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_sync_player_rejects_mob_ids() {
        let mut dir = EntityDirectory::new();
        let record = PlayerRecord::new(EntityId::from_raw(MOB_ID_BASE + 1), 3, Vec3::ZERO, 50);
        assert!(matches!(
            dir.sync_player(record),
            Err(DirectoryError::InvalidPlayerId(_))
        ));

        let null = PlayerRecord::new(EntityId::NULL, 3, Vec3::ZERO, 50);
        assert!(dir.sync_player(null).is_err());
    }

    #[test]
    fn test_sync_player_upserts_and_clamps() {
        let mut dir = EntityDirectory::new();
        let id = EntityId::from_raw(1);

        dir.sync_player(PlayerRecord::new(id, 3, Vec3::ZERO, 50))
            .expect("sync");
        dir.sync_player(PlayerRecord::new(id, 4, Vec3::X, 50).with_health(80))
            .expect("resync");

        let player = dir.player(id).expect("player");
        assert_eq!(player.level, 4);
        assert_eq!(player.health, 50);
        assert_eq!(dir.player_count(), 1);
    }

    #[test]
    fn test_mob_ids_sorted() {
        let mut dir = EntityDirectory::new();
        let first = dir.next_mob_id();
        let second = dir.next_mob_id();
        dir.insert_mob(test_mob(second, MobKind::Wolf, 2, Vec3::ZERO))
            .expect("insert");
        dir.insert_mob(test_mob(first, MobKind::Goblin, 2, Vec3::ZERO))
            .expect("insert");

        assert_eq!(dir.mob_ids(), vec![first, second]);
        assert!(first.is_mob());
    }

    #[test]
    fn test_apply_damage_to_mob_marks_dead() {
        let mut dir = EntityDirectory::new();
        let id = dir.next_mob_id();
        dir.insert_mob(test_mob(id, MobKind::Goblin, 5, Vec3::ZERO))
            .expect("insert");

        let hit = dir.apply_damage(id, 25, SimTime::ZERO).expect("damage");
        assert_eq!(hit.remaining, 5);
        assert!(!hit.killed);

        let hit = dir.apply_damage(id, 25, SimTime::ZERO).expect("damage");
        assert_eq!(hit.applied, 5);
        assert!(hit.killed);
        assert!(dir.active_mob(id).is_none());
        assert_eq!(dir.mob(id).map(|m| m.state), Some(AiState::Dead));

        // Already dead: nothing left to kill.
        let hit = dir.apply_damage(id, 25, SimTime::ZERO).expect("damage");
        assert!(!hit.killed);
        assert_eq!(hit.applied, 0);
    }

    #[test]
    fn test_apply_damage_to_player() {
        let mut dir = EntityDirectory::new();
        let id = EntityId::from_raw(7);
        dir.sync_player(PlayerRecord::new(id, 3, Vec3::ZERO, 20))
            .expect("sync");

        let hit = dir.apply_damage(id, 30, SimTime::ZERO).expect("damage");
        assert!(hit.killed);
        assert_eq!(hit.applied, 20);
        assert!(!dir.is_alive(id));
        assert_eq!(dir.live_players().count(), 0);
        assert!(dir.apply_damage(EntityId::from_raw(8), 1, SimTime::ZERO).is_err());
    }

    #[test]
    fn test_mobs_in_radius_nearest_first() {
        let mut dir = EntityDirectory::new();
        let far = dir.next_mob_id();
        let near = dir.next_mob_id();
        let outside = dir.next_mob_id();
        dir.insert_mob(test_mob(far, MobKind::Goblin, 1, Vec3::new(5.0, 0.0, 0.0)))
            .expect("insert");
        dir.insert_mob(test_mob(near, MobKind::Goblin, 1, Vec3::new(1.0, 0.0, 0.0)))
            .expect("insert");
        dir.insert_mob(test_mob(outside, MobKind::Goblin, 1, Vec3::new(50.0, 0.0, 0.0)))
            .expect("insert");

        let ids: Vec<_> = dir
            .mobs_in_radius(Vec3::ZERO, 10.0)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![near, far]);
    }

    #[test]
    fn test_combat_profile_bonus() {
        let mut dir = EntityDirectory::new();
        let id = EntityId::from_raw(2);
        dir.sync_player(
            PlayerRecord::new(id, 10, Vec3::ZERO, 100)
                .with_attributes(7, 11, 3)
                .with_weapon(WeaponCategory::Ranged, 9),
        )
        .expect("sync");

        let profile = dir.combat_profile(id).expect("profile");
        assert_eq!(profile.attribute_bonus(WeaponCategory::Melee), 7);
        assert_eq!(profile.attribute_bonus(WeaponCategory::Ranged), 11);
        assert_eq!(profile.weapon_damage, 9);
    }
}
