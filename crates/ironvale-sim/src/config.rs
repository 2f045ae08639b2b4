//! Simulation tuning parameters.
//!
//! Durations are stored as milliseconds so the struct maps cleanly onto a
//! TOML table; accessor methods return `Duration`s.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::mob::WeaponCategory;

/// Tunable parameters for AI, combat and lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Timing ===
    /// Minimum interval between two AI evaluations of one mob
    pub ai_tick_ms: u64,
    /// Minimum interval between two accepted attacks from one attacker
    pub attack_cooldown_ms: u64,
    /// Combat sessions with no hit for longer than this are closed
    pub combat_timeout_ms: u64,
    /// Respawn delay for spawn points that do not set their own
    pub respawn_delay_ms: u64,
    /// How long an idle mob waits before wandering
    pub patrol_interval_ms: u64,

    // === Ranges & movement ===
    /// Engagement range for melee weapons
    pub melee_range: f32,
    /// Engagement range for ranged weapons
    pub ranged_range: f32,
    /// Attacking mobs keep attacking until the target exceeds range times this
    pub disengage_multiplier: f32,
    /// Leash distance from home while chasing
    pub max_chase_distance: f32,
    /// Horizontal distance a mob moves per AI tick
    pub move_step: f32,
    /// Distance from home considered "arrived"
    pub arrival_epsilon: f32,

    // === Aggro ===
    /// Mobs at or above this level ignore the player-level gate
    pub aggro_level_threshold: u32,

    // === Damage ===
    /// Fraction of target defense subtracted from melee hits
    pub melee_defense_factor: f32,
    /// Fraction of target defense subtracted from ranged hits
    pub ranged_defense_factor: f32,
    /// Symmetric multiplicative damage variance (0.2 = ±20%)
    pub damage_variance: f32,

    // === Misc ===
    /// Seed for damage variance and patrol waypoints
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            // Timing
            ai_tick_ms: 500,
            attack_cooldown_ms: 1_500,
            combat_timeout_ms: 10_000,
            respawn_delay_ms: 15 * 60 * 1_000, // 15 minutes
            patrol_interval_ms: 8_000,

            // Ranges & movement
            melee_range: 2.0,
            ranged_range: 15.0,
            disengage_multiplier: 1.5,
            max_chase_distance: 30.0,
            move_step: 2.0,
            arrival_epsilon: 0.5,

            // Aggro
            aggro_level_threshold: 15,

            // Damage
            melee_defense_factor: 0.5,
            ranged_defense_factor: 0.3,
            damage_variance: 0.2,

            rng_seed: 0x1_2345,
        }
    }
}

impl SimConfig {
    /// AI evaluation interval.
    #[must_use]
    pub const fn ai_tick(&self) -> Duration {
        Duration::from_millis(self.ai_tick_ms)
    }

    /// Attack cooldown interval.
    #[must_use]
    pub const fn attack_cooldown(&self) -> Duration {
        Duration::from_millis(self.attack_cooldown_ms)
    }

    /// Combat session inactivity timeout.
    #[must_use]
    pub const fn combat_timeout(&self) -> Duration {
        Duration::from_millis(self.combat_timeout_ms)
    }

    /// Default respawn delay.
    #[must_use]
    pub const fn respawn_delay(&self) -> Duration {
        Duration::from_millis(self.respawn_delay_ms)
    }

    /// Idle time before a mob wanders.
    #[must_use]
    pub const fn patrol_interval(&self) -> Duration {
        Duration::from_millis(self.patrol_interval_ms)
    }

    /// Engagement range for a weapon category (inclusive).
    #[must_use]
    pub fn engagement_range(&self, weapon: WeaponCategory) -> f32 {
        match weapon {
            WeaponCategory::Melee => self.melee_range,
            WeaponCategory::Ranged => self.ranged_range,
        }
    }

    /// Range beyond which an attacking mob goes back to chasing.
    #[must_use]
    pub fn disengage_range(&self, weapon: WeaponCategory) -> f32 {
        self.engagement_range(weapon) * self.disengage_multiplier
    }

    /// Fraction of defense that mitigates a hit of the given category.
    #[must_use]
    pub fn defense_factor(&self, weapon: WeaponCategory) -> f32 {
        match weapon {
            WeaponCategory::Melee => self.melee_defense_factor,
            WeaponCategory::Ranged => self.ranged_defense_factor,
        }
    }
}
