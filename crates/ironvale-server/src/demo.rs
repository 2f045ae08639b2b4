//! Stand-in collaborators so the server runs without inventory, loot or
//! client services attached.

use ahash::AHashMap;
use ironvale_common::{offset_on_plane, EntityId, ItemTypeId, LootTableId, Vec3};
use ironvale_sim::{
    AmmoSource, EntityDirectory, LootDrop, LootRoller, PlayerRecord, SimConfig, WeaponCategory,
};
use std::f32::consts::TAU;
use std::time::Duration;

/// Fixed-size quiver per player.
#[derive(Debug)]
pub struct DemoAmmo {
    quiver: u32,
    spent: AHashMap<EntityId, u32>,
}

impl DemoAmmo {
    /// Every player starts with `quiver` arrows.
    pub fn new(quiver: u32) -> Self {
        Self {
            quiver,
            spent: AHashMap::new(),
        }
    }
}

impl AmmoSource for DemoAmmo {
    fn try_consume(&mut self, player: EntityId) -> bool {
        let spent = self.spent.entry(player).or_insert(0);
        if *spent >= self.quiver {
            return false;
        }
        *spent += 1;
        true
    }
}

/// Rolls zero to three of one of four items per table.
#[derive(Debug)]
pub struct DemoLoot {
    rng: fastrand::Rng,
}

impl DemoLoot {
    /// Seeded roller.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl LootRoller for DemoLoot {
    fn roll(&mut self, table: LootTableId) -> Vec<LootDrop> {
        let quantity = self.rng.u32(0..=3);
        if quantity == 0 {
            return Vec::new();
        }
        let item = table.raw().saturating_mul(100) + self.rng.u32(0..4);
        vec![LootDrop {
            item: ItemTypeId::new(item),
            quantity,
        }]
    }
}

/// A player walking a fixed circle and attacking whatever mob is in reach.
#[derive(Debug, Clone)]
pub struct ScriptedPlayer {
    id: EntityId,
    level: u32,
    weapon: WeaponCategory,
    center: Vec3,
    radius: f32,
    lap: Duration,
    phase: f32,
}

impl ScriptedPlayer {
    const MAX_HEALTH: u32 = 200;

    /// The `index`-th demo player. Even indices carry melee weapons, odd ones bows.
    pub fn new(index: u32, center: Vec3) -> Self {
        let weapon = if index % 2 == 0 {
            WeaponCategory::Melee
        } else {
            WeaponCategory::Ranged
        };
        Self {
            id: EntityId::from_raw(u64::from(index) + 1),
            level: 3 + index * 4,
            weapon,
            center,
            radius: 12.0 + index as f32 * 4.0,
            lap: Duration::from_secs(60),
            phase: index as f32 * 1.3,
        }
    }

    /// Player id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Where the player stands `elapsed` into the run.
    #[must_use]
    pub fn position_at(&self, elapsed: Duration) -> Vec3 {
        let turns = elapsed.as_secs_f32() / self.lap.as_secs_f32();
        offset_on_plane(self.center, self.phase + turns * TAU, self.radius)
    }

    /// Snapshot to sync into the simulation.
    ///
    /// `health` carries over the simulation's view; a defeated player comes
    /// back at full health.
    pub fn record(&self, elapsed: Duration, health: Option<u32>) -> PlayerRecord {
        let health = health.filter(|h| *h > 0).unwrap_or(Self::MAX_HEALTH);
        PlayerRecord::new(self.id, self.level, self.position_at(elapsed), Self::MAX_HEALTH)
            .with_attributes(2 + self.level / 2, 2 + self.level / 2, 1 + self.level / 4)
            .with_weapon(self.weapon, 4)
            .with_health(health)
    }

    /// Nearest live mob within weapon reach.
    pub fn pick_target(&self, directory: &EntityDirectory, config: &SimConfig) -> Option<EntityId> {
        let position = directory.position(self.id)?;
        directory
            .mobs_in_radius(position, config.engagement_range(self.weapon))
            .first()
            .map(|mob| mob.id)
    }
}
