//! Damage formula.
//!
//! - Raw damage is weapon damage plus the attacker's attribute for the
//!   weapon category (strength for melee, ranged for ranged)
//! - A fraction of target defense is subtracted, floored at 1
//! - A uniform multiplicative variance is applied and the result truncated

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::directory::CombatProfile;
use crate::mob::WeaponCategory;

/// Inputs to one damage roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageInput {
    /// Base damage of the weapon
    pub weapon_damage: u32,
    /// Attacker attribute bonus for the weapon category
    pub attribute_bonus: u32,
    /// Target defense
    pub defense: u32,
    /// Fraction of defense that mitigates this hit
    pub defense_factor: f32,
}

impl DamageInput {
    /// Builds the input for `attacker` hitting `target` with `weapon`.
    #[must_use]
    pub fn between(
        attacker: &CombatProfile,
        target: &CombatProfile,
        weapon: WeaponCategory,
        config: &SimConfig,
    ) -> Self {
        Self {
            weapon_damage: attacker.weapon_damage,
            attribute_bonus: attacker.attribute_bonus(weapon),
            defense: target.defense,
            defense_factor: config.defense_factor(weapon),
        }
    }

    /// Damage after mitigation, before variance. Never below 1.
    #[must_use]
    pub fn base(&self) -> f32 {
        let raw = self.weapon_damage.saturating_add(self.attribute_bonus) as f32;
        let mitigation = self.defense as f32 * self.defense_factor;
        (raw - mitigation).max(1.0)
    }

    /// Inclusive bounds of [`DamageInput::roll`] for a variance.
    #[must_use]
    pub fn bounds(&self, variance: f32) -> (u32, u32) {
        let base = self.base();
        (
            (base * (1.0 - variance)) as u32,
            (base * (1.0 + variance)) as u32,
        )
    }

    /// Final damage for a uniform sample `roll` in `[0, 1)`.
    #[must_use]
    pub fn roll(&self, variance: f32, roll: f32) -> u32 {
        let spread = (roll.clamp(0.0, 1.0) * 2.0 - 1.0) * variance;
        (self.base() * (1.0 + spread)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(weapon: u32, bonus: u32, defense: u32, factor: f32) -> DamageInput {
        DamageInput {
            weapon_damage: weapon,
            attribute_bonus: bonus,
            defense,
            defense_factor: factor,
        }
    }

    #[test]
    fn test_base_subtracts_defense_fraction() {
        // 10 + 5 - 0.5 * 8
        assert!((input(10, 5, 8, 0.5).base() - 11.0).abs() < 0.001);
        // 10 + 5 - 0.3 * 10
        assert!((input(10, 5, 10, 0.3).base() - 12.0).abs() < 0.001);
    }

    #[test]
    fn test_base_floors_at_one() {
        assert!((input(1, 0, 100, 0.5).base() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_roll_extremes() {
        let hit = input(10, 0, 0, 0.5);
        assert_eq!(hit.roll(0.2, 0.0), 8);
        assert_eq!(hit.roll(0.2, 0.5), 10);
        assert_eq!(hit.roll(0.2, 1.0), 12);
        assert_eq!(hit.bounds(0.2), (8, 12));
    }

    #[test]
    fn test_between_uses_category_attribute() {
        let config = SimConfig::default();
        let attacker = CombatProfile {
            position: ironvale_common::Vec3::ZERO,
            level: 1,
            strength: 4,
            ranged: 9,
            defense: 0,
            weapon_damage: 6,
            alive: true,
        };
        let target = CombatProfile {
            defense: 10,
            ..attacker
        };

        let melee = DamageInput::between(&attacker, &target, WeaponCategory::Melee, &config);
        assert_eq!(melee.attribute_bonus, 4);
        assert!((melee.base() - 5.0).abs() < 0.001);

        let ranged = DamageInput::between(&attacker, &target, WeaponCategory::Ranged, &config);
        assert_eq!(ranged.attribute_bonus, 9);
        assert!((ranged.base() - 12.0).abs() < 0.001);
    }
}
