//! Mob classifications, stat blocks and live mob instances.

use ironvale_common::{EntityId, LootTableId, SimTime, SpawnPointId, Vec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Weapons
// ============================================================================

/// Weapon category, which selects engagement range and damage attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponCategory {
    /// Close-quarters weapon; scales with strength.
    #[default]
    Melee,
    /// Bow, crossbow, thrown; scales with the ranged attribute.
    Ranged,
}

impl WeaponCategory {
    /// Returns the name used in logs and events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Melee => "melee",
            Self::Ranged => "ranged",
        }
    }
}

// ============================================================================
// Mob classification
// ============================================================================

/// Relative strength classification of a mob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobTier {
    /// Fodder.
    Minion,
    /// Regular field mob.
    Standard,
    /// Named or dungeon mob.
    Elite,
    /// World boss.
    Boss,
}

/// Rule deciding which players an aggressive mob will engage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggroRule {
    /// Low-level mobs ignore players far above their own level.
    LevelGated,
    /// Engages any player in range regardless of level.
    Always,
}

impl AggroRule {
    /// Returns whether a mob of `mob_level` will aggro a player of
    /// `player_level` under this rule.
    ///
    /// Under [`AggroRule::LevelGated`], a mob below `threshold` ignores any
    /// player whose level exceeds twice its own.
    #[must_use]
    pub const fn permits(self, mob_level: u32, player_level: u32, threshold: u32) -> bool {
        match self {
            Self::Always => true,
            Self::LevelGated => {
                mob_level >= threshold || player_level <= mob_level.saturating_mul(2)
            },
        }
    }
}

/// Mob kinds that can be placed at a spawn point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobKind {
    /// Weak melee skirmisher
    Goblin,
    /// Fast pack animal
    Wolf,
    /// Undead archer
    Skeleton,
    /// Human outlaw with a crossbow
    Bandit,
    /// Heavy melee brute
    Orc,
    /// Regenerating giant
    Troll,
    /// Spectral hunter, hostile to everything living
    Wraith,
    /// World boss
    Dragon,
}

impl MobKind {
    /// Get display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Goblin => "Goblin",
            Self::Wolf => "Wolf",
            Self::Skeleton => "Skeleton",
            Self::Bandit => "Bandit",
            Self::Orc => "Orc",
            Self::Troll => "Troll",
            Self::Wraith => "Wraith",
            Self::Dragon => "Dragon",
        }
    }

    /// Get the tier of this kind.
    #[must_use]
    pub const fn tier(self) -> MobTier {
        match self {
            Self::Goblin | Self::Wolf => MobTier::Minion,
            Self::Skeleton | Self::Bandit | Self::Orc => MobTier::Standard,
            Self::Troll | Self::Wraith => MobTier::Elite,
            Self::Dragon => MobTier::Boss,
        }
    }

    /// Get the aggro rule of this kind.
    ///
    /// Wraiths and dragons are on the always-aggressive list and bypass the
    /// level gate entirely.
    #[must_use]
    pub const fn aggro_rule(self) -> AggroRule {
        match self {
            Self::Wraith | Self::Dragon => AggroRule::Always,
            Self::Goblin
            | Self::Wolf
            | Self::Skeleton
            | Self::Bandit
            | Self::Orc
            | Self::Troll => AggroRule::LevelGated,
        }
    }

    /// Default weapon category.
    #[must_use]
    pub const fn default_weapon(self) -> WeaponCategory {
        match self {
            Self::Skeleton | Self::Bandit => WeaponCategory::Ranged,
            Self::Goblin
            | Self::Wolf
            | Self::Orc
            | Self::Troll
            | Self::Wraith
            | Self::Dragon => WeaponCategory::Melee,
        }
    }

    /// Default aggro radius.
    #[must_use]
    pub const fn default_aggro_radius(self) -> f32 {
        match self.tier() {
            MobTier::Minion => 8.0,
            MobTier::Standard => 10.0,
            MobTier::Elite => 12.0,
            MobTier::Boss => 20.0,
        }
    }

    /// Default stat block for this kind.
    #[must_use]
    pub const fn base_stats(self) -> MobStats {
        match self {
            Self::Goblin => MobStats::new(3, 3, 1, 1, 4),
            Self::Wolf => MobStats::new(4, 4, 0, 2, 5),
            Self::Skeleton => MobStats::new(5, 2, 5, 3, 6),
            Self::Bandit => MobStats::new(6, 4, 6, 4, 7),
            Self::Orc => MobStats::new(9, 8, 1, 6, 10),
            Self::Troll => MobStats::new(20, 14, 0, 10, 14),
            Self::Wraith => MobStats::new(12, 10, 0, 8, 12),
            Self::Dragon => MobStats::new(80, 30, 20, 25, 30),
        }
    }

    /// Returns all kinds.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::Goblin,
            Self::Wolf,
            Self::Skeleton,
            Self::Bandit,
            Self::Orc,
            Self::Troll,
            Self::Wraith,
            Self::Dragon,
        ]
    }
}

/// Combat stat block of a mob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MobStats {
    /// Constitution; max health is ten times this
    pub constitution: u32,
    /// Melee damage bonus
    pub strength: u32,
    /// Ranged damage bonus
    pub ranged: u32,
    /// Damage mitigation
    pub defense: u32,
    /// Base damage of the equipped weapon
    pub weapon_damage: u32,
}

impl MobStats {
    /// Creates a stat block.
    #[must_use]
    pub const fn new(
        constitution: u32,
        strength: u32,
        ranged: u32,
        defense: u32,
        weapon_damage: u32,
    ) -> Self {
        Self {
            constitution,
            strength,
            ranged,
            defense,
            weapon_damage,
        }
    }

    /// Maximum health derived from constitution.
    #[must_use]
    pub const fn max_health(&self) -> u32 {
        self.constitution.saturating_mul(10)
    }
}

// ============================================================================
// AI state
// ============================================================================

/// State of the mob AI state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiState {
    /// Standing at or near home, scanning for players.
    #[default]
    Idle,
    /// Wandering to a random point near home, still scanning.
    Patrolling,
    /// Pursuing a target.
    Chasing,
    /// Within engagement range of the target.
    Attacking,
    /// Walking back home after losing or leashing off a target.
    Returning,
    /// Health is zero; waiting for respawn.
    Dead,
}

impl AiState {
    /// Returns the name used in logs and events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Patrolling => "patrolling",
            Self::Chasing => "chasing",
            Self::Attacking => "attacking",
            Self::Returning => "returning",
            Self::Dead => "dead",
        }
    }
}

// ============================================================================
// Mob instance
// ============================================================================

/// A live (or dead, awaiting respawn) mob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mob {
    /// Stable id, kept across respawns
    pub id: EntityId,
    /// Spawn point this mob belongs to
    pub spawn_point: SpawnPointId,
    /// Kind of mob
    pub kind: MobKind,
    /// Level
    pub level: u32,
    /// Stat block
    pub stats: MobStats,
    /// Current health
    pub health: u32,
    /// Maximum health
    pub max_health: u32,
    /// Current position
    pub position: Vec3,
    /// Spawn position
    pub home: Vec3,
    /// Whether the mob scans for players on its own
    pub aggressive: bool,
    /// Scan radius
    pub aggro_radius: f32,
    /// Equipped weapon category
    pub weapon: WeaponCategory,
    /// Loot table rolled on death
    pub loot_table: Option<LootTableId>,
    /// Wander radius around home (0 disables patrolling)
    pub patrol_radius: f32,
    /// AI state
    pub state: AiState,
    /// Current target
    pub target: Option<EntityId>,
    /// Schedule slot of the last AI evaluation
    pub last_ai_tick: Option<SimTime>,
    /// Time the current state was entered
    pub state_since: SimTime,
    /// Current patrol destination
    pub patrol_waypoint: Option<Vec3>,
}

impl Mob {
    /// Returns true while health is above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Returns true once the mob has died.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        matches!(self.state, AiState::Dead)
    }

    /// Enters `state`. Returns the previous state if it changed.
    pub fn set_state(&mut self, state: AiState, now: SimTime) -> Option<AiState> {
        if self.state == state {
            return None;
        }
        let previous = self.state;
        self.state = state;
        self.state_since = now;
        Some(previous)
    }

    /// Drops the current target and heads home.
    pub fn disengage(&mut self, now: SimTime) -> Option<AiState> {
        self.target = None;
        self.patrol_waypoint = None;
        self.set_state(AiState::Returning, now)
    }

    /// Subtracts `amount` from health, clamping at zero.
    ///
    /// A mob whose health reaches zero enters [`AiState::Dead`] and drops its
    /// target in the same step. Returns the damage actually applied.
    pub fn apply_damage(&mut self, amount: u32, now: SimTime) -> u32 {
        let applied = amount.min(self.health);
        self.health -= applied;
        if self.health == 0 {
            self.target = None;
            self.patrol_waypoint = None;
            self.set_state(AiState::Dead, now);
        }
        applied
    }

    /// Checks the health and state invariants.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        self.health <= self.max_health && (self.health == 0) == self.is_dead()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goblin() -> Mob {
        let stats = MobKind::Goblin.base_stats();
        Mob {
            id: EntityId::from_raw(ironvale_common::MOB_ID_BASE),
            spawn_point: SpawnPointId::new(1),
            kind: MobKind::Goblin,
            level: 5,
            stats,
            health: stats.max_health(),
            max_health: stats.max_health(),
            position: Vec3::ZERO,
            home: Vec3::ZERO,
            aggressive: true,
            aggro_radius: 8.0,
            weapon: WeaponCategory::Melee,
            loot_table: None,
            patrol_radius: 0.0,
            state: AiState::Idle,
            target: None,
            last_ai_tick: None,
            state_since: SimTime::ZERO,
            patrol_waypoint: None,
        }
    }

    #[test]
    fn test_max_health_from_constitution() {
        assert_eq!(MobKind::Goblin.base_stats().max_health(), 30);
        assert_eq!(MobStats::new(7, 0, 0, 0, 0).max_health(), 70);
    }

    #[test]
    fn test_level_gate() {
        let rule = MobKind::Goblin.aggro_rule();
        assert!(!rule.permits(5, 30, 15));
        assert!(rule.permits(5, 3, 15));
        assert!(rule.permits(5, 10, 15)); // exactly twice the mob level
        assert!(!rule.permits(5, 11, 15));
        assert!(rule.permits(15, 60, 15)); // at threshold the gate no longer applies
    }

    #[test]
    fn test_always_aggressive_kinds() {
        assert_eq!(MobKind::Wraith.aggro_rule(), AggroRule::Always);
        assert_eq!(MobKind::Dragon.aggro_rule(), AggroRule::Always);
        assert!(MobKind::Wraith.aggro_rule().permits(5, 30, 15));

        let always: Vec<_> = MobKind::all()
            .into_iter()
            .filter(|k| k.aggro_rule() == AggroRule::Always)
            .collect();
        assert!(always.iter().all(|k| k.tier() >= MobTier::Elite));
    }

    #[test]
    fn test_default_weapons() {
        assert_eq!(MobKind::Skeleton.default_weapon(), WeaponCategory::Ranged);
        assert_eq!(MobKind::Goblin.default_weapon(), WeaponCategory::Melee);
    }

    #[test]
    fn test_apply_damage_clamps_and_kills() {
        let mut mob = goblin();
        let now = SimTime::from_secs(3);

        assert_eq!(mob.apply_damage(12, now), 12);
        assert_eq!(mob.health, 18);
        assert!(mob.invariants_hold());

        assert_eq!(mob.apply_damage(100, now), 18);
        assert_eq!(mob.health, 0);
        assert_eq!(mob.state, AiState::Dead);
        assert_eq!(mob.state_since, now);
        assert!(mob.invariants_hold());
    }

    #[test]
    fn test_set_state_reports_transition() {
        let mut mob = goblin();
        assert_eq!(mob.set_state(AiState::Chasing, SimTime::from_secs(1)), Some(AiState::Idle));
        assert_eq!(mob.set_state(AiState::Chasing, SimTime::from_secs(2)), None);
        assert_eq!(mob.state_since, SimTime::from_secs(1));
    }

    #[test]
    fn test_disengage_clears_target() {
        let mut mob = goblin();
        mob.target = Some(EntityId::from_raw(9));
        mob.state = AiState::Chasing;

        mob.disengage(SimTime::ZERO);
        assert!(mob.target.is_none());
        assert_eq!(mob.state, AiState::Returning);
    }
}
