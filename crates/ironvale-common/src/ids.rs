//! ID types for entities and static world data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First raw value of the mob id range.
///
/// Player ids are assigned by the player directory and must stay below this
/// value; mob ids are allocated by the simulation from this value upward.
pub const MOB_ID_BASE: u64 = 1 << 32;

/// Unique identifier for a player or mob in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an entity ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) entity ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Returns true if the id falls in the mob range.
    #[must_use]
    pub const fn is_mob(self) -> bool {
        self.0 >= MOB_ID_BASE
    }

    /// Returns true if the id falls in the player range.
    #[must_use]
    pub const fn is_player(self) -> bool {
        self.is_valid() && !self.is_mob()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_mob() {
            write!(f, "mob#{}", self.0 - MOB_ID_BASE)
        } else {
            write!(f, "player#{}", self.0)
        }
    }
}

/// Unique identifier for a spawn point in the world definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpawnPointId(u32);

impl SpawnPointId {
    /// Creates a spawn point ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Identifier of a loot table owned by the loot collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LootTableId(u32);

impl LootTableId {
    /// Creates a loot table ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Unique identifier for an item type in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(u32);

impl ItemTypeId {
    /// Creates an item type ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_ranges() {
        let player = EntityId::from_raw(42);
        let mob = EntityId::from_raw(MOB_ID_BASE + 7);

        assert!(player.is_player());
        assert!(!player.is_mob());
        assert!(mob.is_mob());
        assert!(!mob.is_player());
        assert!(!EntityId::NULL.is_valid());
        assert!(!EntityId::NULL.is_player());
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId::from_raw(3).to_string(), "player#3");
        assert_eq!(EntityId::from_raw(MOB_ID_BASE + 3).to_string(), "mob#3");
    }
}
